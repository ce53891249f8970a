#![deny(unsafe_code)]

//! MQTT 3.1.1 wire protocol codec
//!
//! ## Core Features:
//! - **Incremental Decoding**: arbitrarily fragmented input is reassembled into
//!   whole control packets; nothing is consumed from the receive buffer until a
//!   complete frame is present
//! - **Protocol Enforcement**: every invariant of the 3.1.1 framing rules fails
//!   with its own [`error::DecodeError`] variant, so hosts can diagnose exactly
//!   which rule a peer violated
//! - **Zero-Copy Payloads**: PUBLISH payloads are shared slices of the receive
//!   buffer on the way in and stand-alone retained buffers on the way out
//! - **Tokio Integration**: [`Codec`] implements `tokio_util::codec::{Decoder,
//!   Encoder}` for use with `Framed` transports
//!
//! ## Architecture Components:
//! - [`Codec`]: per-connection frame assembler and dispatcher
//! - [`Packet`]: closed set of the fourteen 3.1.1 control packets
//! - [`encode_to_buffers`]: stateless packet serializer producing
//!   transport-ready buffer sequences
//! - Error handling with dedicated [`error::EncodeError`]/[`error::DecodeError`] types

#[macro_use]
mod utils;

/// Error types for encoding/decoding operations
pub mod error;

/// Shared types and constants for the MQTT 3.1.1 protocol
pub mod types;

/// Topic name and topic filter validation
pub mod topic;

mod codec;
mod decode;
mod encode;
mod packet;

pub use self::codec::{Codec, ReplySink};
pub use self::encode::encode_to_buffers;
pub use self::packet::{
    Connect, ConnectAck, ConnectAckReason, LastWill, Packet, Publish, SubscribeReturnCode,
};
pub use self::types::{QoS, Side};
