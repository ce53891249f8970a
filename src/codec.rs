use std::cell::Cell;
use std::fmt;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::decode::decode_packet;
use crate::encode;
use crate::error::{DecodeError, EncodeError};
use crate::packet::{ConnectAck, ConnectAckReason, Packet};
use crate::types::{Side, MAX_REMAINING_LENGTH};
use crate::utils::decode_variable_length;

/// Outbound channel for the one reply the decoder produces on its own: the
/// refusal CONNACK sent before failing on an unacceptable protocol level.
/// The host owns flushing whatever the sink collects.
pub trait ReplySink {
    fn reply(&mut self, packet: Packet);
}

/// Mqtt v3.1.1 protocol codec.
///
/// Decoding is stateful and belongs to exactly one connection: one `Codec`
/// per stream, calls serialized in arrival order. Encoding keeps no per-call
/// state and mirrors the free-standing [`crate::encode_to_buffers`].
pub struct Codec {
    side: Side,
    state: Cell<DecodeState>,
    max_size: Cell<u32>,
    reply_sink: Option<Box<dyn ReplySink + Send>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DecodeState {
    /// Between frames; the read position sits on a frame boundary.
    Ready,
    /// A framing rule was violated; everything that follows is discarded.
    Failed,
}

impl Codec {
    /// Create a `Codec` decoding the given side of the connection.
    ///
    /// `max_frame_size` bounds the TOTAL frame: signature byte, length field
    /// and declared remaining length. If set to `0`, size is unlimited.
    pub fn new(side: Side, max_frame_size: u32) -> Self {
        Codec {
            side,
            state: Cell::new(DecodeState::Ready),
            max_size: Cell::new(max_frame_size),
            reply_sink: None,
        }
    }

    /// Attach the sink that carries decoder-originated replies.
    pub fn with_reply_sink(mut self, sink: impl ReplySink + Send + 'static) -> Self {
        self.reply_sink = Some(Box::new(sink));
        self
    }

    /// Set max inbound frame size.
    ///
    /// If max size is set to `0`, size is unlimited.
    pub fn set_max_size(&mut self, size: u32) {
        self.max_size.set(size);
    }

    /// Whether a fatal framing error has been seen on this stream.
    pub fn is_failed(&self) -> bool {
        self.state.get() == DecodeState::Failed
    }

    fn fail(&self, e: DecodeError) -> DecodeError {
        log::debug!("decode failed, side: {:?}, error: {}", self.side, e);
        self.state.set(DecodeState::Failed);
        e
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("side", &self.side)
            .field("state", &self.state.get())
            .field("max_size", &self.max_size.get())
            .finish_non_exhaustive()
    }
}

impl Decoder for Codec {
    type Item = (Packet, u32);
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, DecodeError> {
        if self.state.get() == DecodeState::Failed {
            // framing is unrecoverable; swallow whatever still arrives
            src.clear();
            return Ok(None);
        }

        // Phase one: is a whole frame present? Nothing is consumed until it
        // is, so a short read leaves the buffer byte-for-byte intact for the
        // next call.
        if src.len() < 2 {
            return Ok(None);
        }
        let first_byte = src[0];
        let (remaining_length, consumed) = match decode_variable_length(&src[1..]) {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.fail(e)),
        };

        let frame_size = 1 + consumed + remaining_length as usize;
        let max_size = self.max_size.get();
        if max_size != 0 && frame_size > max_size as usize {
            log::debug!("max-size: {}, frame-size: {}", max_size, frame_size);
            return Err(self.fail(DecodeError::MaxSizeExceeded));
        }
        if src.len() < frame_size {
            src.reserve(frame_size - src.len());
            return Ok(None);
        }

        // Phase two: the frame is complete, commit the read position.
        src.advance(1 + consumed);
        let body = src.split_to(remaining_length as usize).freeze();
        match decode_packet(body, first_byte, self.side) {
            Ok(packet) => Ok(Some((packet, remaining_length))),
            Err(e) => {
                if matches!(e, DecodeError::UnsupportedProtocolLevel) && self.side == Side::Server {
                    if let Some(sink) = self.reply_sink.as_mut() {
                        sink.reply(Packet::ConnectAck(ConnectAck {
                            session_present: false,
                            return_code: ConnectAckReason::UnacceptableProtocolVersion,
                        }));
                    }
                }
                Err(self.fail(e))
            }
        }
    }
}

impl Encoder<Packet> for Codec {
    type Error = EncodeError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), EncodeError> {
        let content_size = encode::get_encoded_size(&item);
        ensure!(content_size <= MAX_REMAINING_LENGTH as usize, EncodeError::InvalidLength);
        dst.reserve(content_size + 5);
        encode::encode(&item, dst, content_size as u32)
    }
}
