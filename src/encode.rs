use std::num::NonZeroU16;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EncodeError;
use crate::packet::{Connect, LastWill, Packet, Publish, SubscribeReturnCode};
use crate::types::{
    packet_type, ConnectFlags, QoS, MAX_REMAINING_LENGTH, PROTOCOL_LEVEL, PROTOCOL_NAME,
    WILL_QOS_SHIFT,
};
use crate::utils::{write_variable_length, Encode};

/// Serialize a packet into transport-ready buffers.
///
/// Everything except a PUBLISH payload is written into a single exactly-sized
/// buffer. The payload travels as a second buffer sharing the application's
/// allocation, so large messages cross the encoder without being copied. The
/// packet is consumed; buffers it owned (will message, payload) are released
/// on every failure path when the partial result is dropped.
pub fn encode_to_buffers(packet: Packet) -> Result<Vec<Bytes>, EncodeError> {
    let content_size = get_encoded_size(&packet);
    ensure!(content_size <= MAX_REMAINING_LENGTH as usize, EncodeError::InvalidLength);

    match packet {
        Packet::Publish(publish) => {
            let header_size = 1 + 4 + (content_size - publish.payload.len());
            let mut dst = BytesMut::with_capacity(header_size);
            encode_publish_header(&publish, content_size as u32, &mut dst)?;
            Ok(vec![dst.freeze(), publish.payload])
        }
        packet => {
            let mut dst = BytesMut::with_capacity(content_size + 5);
            encode(&packet, &mut dst, content_size as u32)?;
            Ok(vec![dst.freeze()])
        }
    }
}

/// Size of the variable header plus payload, i.e. the remaining length the
/// fixed header will declare.
pub(crate) fn get_encoded_size(packet: &Packet) -> usize {
    match *packet {
        Packet::Connect(ref connect) => {
            let Connect { ref last_will, ref client_id, ref username, ref password, .. } =
                **connect;

            // Protocol Name + Protocol Level + Connect Flags + Keep Alive
            let mut n = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2;

            // Client Id
            n += 2 + client_id.len();

            // Will Topic + Will Message
            if let Some(LastWill { ref topic, ref message, .. }) = *last_will {
                n += 2 + topic.len() + 2 + message.len();
            }
            if let Some(ref s) = *username {
                n += 2 + s.len();
            }
            if let Some(ref s) = *password {
                n += 2 + s.len();
            }
            n
        }

        Packet::Publish(ref publish) => get_encoded_publish_size(publish),

        Packet::ConnectAck { .. } // Ack Flags + Return Code
        | Packet::PublishAck { .. }
        | Packet::PublishReceived { .. }
        | Packet::PublishRelease { .. }
        | Packet::PublishComplete { .. }
        | Packet::UnsubscribeAck { .. } => 2, // Packet Id

        Packet::Subscribe { ref topic_filters, .. } => {
            2 + topic_filters.iter().fold(0, |acc, (filter, _)| acc + 2 + filter.len() + 1)
        }
        Packet::SubscribeAck { ref status, .. } => 2 + status.len(),
        Packet::Unsubscribe { ref topic_filters, .. } => {
            2 + topic_filters.iter().fold(0, |acc, filter| acc + 2 + filter.len())
        }

        Packet::PingRequest | Packet::PingResponse | Packet::Disconnect => 0,
    }
}

fn get_encoded_publish_size(p: &Publish) -> usize {
    // Topic (+ Packet Id) + Payload
    if p.qos == QoS::AtMostOnce {
        2 + p.topic.len() + p.payload.len()
    } else {
        4 + p.topic.len() + p.payload.len()
    }
}

/// Contiguous encoding: fixed header, remaining length, variable header and
/// payload, all into `dst`.
pub(crate) fn encode(packet: &Packet, dst: &mut BytesMut, content_size: u32) -> Result<(), EncodeError> {
    match packet {
        Packet::Connect(connect) => {
            dst.put_u8(packet_type::CONNECT);
            write_variable_length(content_size, dst);
            encode_connect(connect, dst)?;
        }
        Packet::ConnectAck(ack) => {
            dst.put_u8(packet_type::CONNACK);
            write_variable_length(content_size, dst);
            dst.put_slice(&[u8::from(ack.session_present), ack.return_code.into()]);
        }
        Packet::Publish(publish) => {
            encode_publish_header(publish, content_size, dst)?;
            dst.put_slice(publish.payload.as_ref());
        }

        Packet::PublishAck { packet_id } => {
            encode_ack(packet_type::PUBACK, *packet_id, dst, content_size)?;
        }
        Packet::PublishReceived { packet_id } => {
            encode_ack(packet_type::PUBREC, *packet_id, dst, content_size)?;
        }
        Packet::PublishRelease { packet_id } => {
            encode_ack(packet_type::PUBREL, *packet_id, dst, content_size)?;
        }
        Packet::PublishComplete { packet_id } => {
            encode_ack(packet_type::PUBCOMP, *packet_id, dst, content_size)?;
        }
        Packet::UnsubscribeAck { packet_id } => {
            encode_ack(packet_type::UNSUBACK, *packet_id, dst, content_size)?;
        }

        Packet::Subscribe { packet_id, ref topic_filters } => {
            dst.put_u8(packet_type::SUBSCRIBE);
            write_variable_length(content_size, dst);
            packet_id.encode(dst)?;
            for &(ref filter, qos) in topic_filters {
                filter.encode(dst)?;
                dst.put_u8(qos.into());
            }
        }
        Packet::SubscribeAck { packet_id, ref status } => {
            dst.put_u8(packet_type::SUBACK);
            write_variable_length(content_size, dst);
            packet_id.encode(dst)?;
            for s in status {
                dst.put_u8(match *s {
                    SubscribeReturnCode::Success(qos) => qos.into(),
                    SubscribeReturnCode::Failure => 0x80,
                });
            }
        }
        Packet::Unsubscribe { packet_id, ref topic_filters } => {
            dst.put_u8(packet_type::UNSUBSCRIBE);
            write_variable_length(content_size, dst);
            packet_id.encode(dst)?;
            for filter in topic_filters {
                filter.encode(dst)?;
            }
        }

        Packet::PingRequest => dst.put_slice(&[packet_type::PINGREQ, 0]),
        Packet::PingResponse => dst.put_slice(&[packet_type::PINGRESP, 0]),
        Packet::Disconnect => dst.put_slice(&[packet_type::DISCONNECT, 0]),
    }

    Ok(())
}

fn encode_ack(
    first_byte: u8,
    packet_id: NonZeroU16,
    dst: &mut BytesMut,
    content_size: u32,
) -> Result<(), EncodeError> {
    dst.put_u8(first_byte);
    write_variable_length(content_size, dst);
    packet_id.encode(dst)
}

/// Fixed header, remaining length, topic and optional packet id of a
/// PUBLISH; the payload is left to the caller.
fn encode_publish_header(
    publish: &Publish,
    content_size: u32,
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    match (publish.qos, publish.packet_id) {
        // packet id must not be set at qos 0
        (QoS::AtMostOnce, Some(_)) => return Err(EncodeError::MalformedPacket),
        (QoS::AtLeastOnce | QoS::ExactlyOnce, None) => return Err(EncodeError::PacketIdRequired),
        _ => {}
    }

    dst.put_u8(
        packet_type::PUBLISH_START
            | ((publish.dup as u8) << 3)
            | (publish.qos.value() << 1)
            | (publish.retain as u8),
    );
    write_variable_length(content_size, dst);
    publish.topic.encode(dst)?;
    if let Some(packet_id) = publish.packet_id {
        packet_id.encode(dst)?;
    }
    Ok(())
}

fn encode_connect(connect: &Connect, dst: &mut BytesMut) -> Result<(), EncodeError> {
    let Connect { clean_session, keep_alive, ref last_will, ref client_id, ref username, ref password } =
        *connect;

    PROTOCOL_NAME.encode(dst)?;

    let mut flags = ConnectFlags::empty();

    if username.is_some() {
        flags |= ConnectFlags::USERNAME;
    }
    if password.is_some() {
        flags |= ConnectFlags::PASSWORD;
    }
    if let Some(LastWill { qos, retain, .. }) = *last_will {
        flags |= ConnectFlags::WILL;
        if retain {
            flags |= ConnectFlags::WILL_RETAIN;
        }
        flags |= ConnectFlags::from_bits_truncate((qos as u8) << WILL_QOS_SHIFT);
    }
    if clean_session {
        flags |= ConnectFlags::CLEAN_SESSION;
    }

    dst.put_slice(&[PROTOCOL_LEVEL, flags.bits()]);
    dst.put_u16(keep_alive);
    client_id.encode(dst)?;

    if let Some(LastWill { ref topic, ref message, .. }) = *last_will {
        topic.encode(dst)?;
        message.encode(dst)?;
    }
    if let Some(ref s) = *username {
        s.encode(dst)?;
    }
    if let Some(ref s) = *password {
        s.encode(dst)?;
    }
    Ok(())
}
