use std::num::NonZeroU16;

use bytes::{Buf, Bytes};
use bytestring::ByteString;

use crate::error::DecodeError;
use crate::packet::{Connect, ConnectAck, LastWill, Packet, Publish, SubscribeReturnCode};
use crate::topic::{validate_filter, validate_publish_topic};
use crate::types::{
    packet_type, ConnectAckFlags, ConnectFlags, QoS, Side, PROTOCOL_LEVEL, PROTOCOL_NAME,
    WILL_QOS_SHIFT,
};
use crate::utils::Decode;

/// Decode one complete frame body.
///
/// `src` holds exactly the declared remaining length; anything left over
/// after the type-specific decode means the peer declared more content than
/// it sent.
pub(crate) fn decode_packet(mut src: Bytes, first_byte: u8, side: Side) -> Result<Packet, DecodeError> {
    check_direction(first_byte, side)?;

    let packet = match first_byte {
        packet_type::CONNECT => decode_connect_packet(&mut src)?,
        packet_type::CONNACK => decode_connect_ack_packet(&mut src)?,
        packet_type::PUBLISH_START..=packet_type::PUBLISH_END => {
            decode_publish_packet(&mut src, first_byte & 0b0000_1111)?
        }
        packet_type::PUBACK => Packet::PublishAck { packet_id: NonZeroU16::decode(&mut src)? },
        packet_type::PUBREC => Packet::PublishReceived { packet_id: NonZeroU16::decode(&mut src)? },
        packet_type::PUBREL => Packet::PublishRelease { packet_id: NonZeroU16::decode(&mut src)? },
        packet_type::PUBCOMP => Packet::PublishComplete { packet_id: NonZeroU16::decode(&mut src)? },
        packet_type::SUBSCRIBE => decode_subscribe_packet(&mut src)?,
        packet_type::SUBACK => decode_subscribe_ack_packet(&mut src)?,
        packet_type::UNSUBSCRIBE => decode_unsubscribe_packet(&mut src)?,
        packet_type::UNSUBACK => Packet::UnsubscribeAck { packet_id: NonZeroU16::decode(&mut src)? },
        packet_type::PINGREQ => Packet::PingRequest,
        packet_type::PINGRESP => Packet::PingResponse,
        packet_type::DISCONNECT => Packet::Disconnect,
        _ => return Err(DecodeError::UnsupportedPacketType),
    };

    ensure!(!src.has_remaining(), DecodeError::RemainingLengthMismatch);
    Ok(packet)
}

/// A decoder only accepts packet types its peer may send. Types that flow in
/// both directions (PUBLISH and its acknowledgements) pass through; unknown
/// types are left for the dispatch to reject.
fn check_direction(first_byte: u8, side: Side) -> Result<(), DecodeError> {
    let to_server = match first_byte >> 4 {
        0b0001 | 0b1000 | 0b1010 | 0b1100 | 0b1110 => true, // CONNECT, SUBSCRIBE, UNSUBSCRIBE, PINGREQ, DISCONNECT
        0b0010 | 0b1001 | 0b1011 | 0b1101 => false, // CONNACK, SUBACK, UNSUBACK, PINGRESP
        _ => return Ok(()),
    };
    let expected = match side {
        Side::Server => to_server,
        Side::Client => !to_server,
    };
    ensure!(expected, DecodeError::UnexpectedPacket);
    Ok(())
}

fn decode_connect_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    ensure!(src.remaining() >= 10, DecodeError::InvalidLength);
    let name_len = src.get_u16();
    ensure!(
        name_len == 4 && &src.as_ref()[0..4] == PROTOCOL_NAME,
        DecodeError::InvalidProtocol
    );
    src.advance(4);

    let level = src.get_u8();
    ensure!(level == PROTOCOL_LEVEL, DecodeError::UnsupportedProtocolLevel);

    let flags =
        ConnectFlags::from_bits(src.get_u8()).ok_or(DecodeError::ConnectReservedFlagSet)?;
    if !flags.contains(ConnectFlags::WILL) {
        ensure!(
            !flags.intersects(ConnectFlags::WILL_QOS | ConnectFlags::WILL_RETAIN),
            DecodeError::WillFlagsWithoutWill
        );
    }
    ensure!(
        flags.contains(ConnectFlags::USERNAME) || !flags.contains(ConnectFlags::PASSWORD),
        DecodeError::PasswordWithoutUsername
    );

    let keep_alive = u16::decode(src)?;
    let client_id = ByteString::decode(src)?;

    let last_will = if flags.contains(ConnectFlags::WILL) {
        let qos = QoS::try_from((flags & ConnectFlags::WILL_QOS).bits() >> WILL_QOS_SHIFT)
            .map_err(|_| DecodeError::ReservedQos)?;
        let topic = ByteString::decode(src)?;
        let message = Bytes::decode(src)?;
        Some(LastWill { qos, retain: flags.contains(ConnectFlags::WILL_RETAIN), topic, message })
    } else {
        None
    };
    let username =
        if flags.contains(ConnectFlags::USERNAME) { Some(ByteString::decode(src)?) } else { None };
    let password =
        if flags.contains(ConnectFlags::PASSWORD) { Some(Bytes::decode(src)?) } else { None };

    Ok(Connect {
        clean_session: flags.contains(ConnectFlags::CLEAN_SESSION),
        keep_alive,
        client_id,
        last_will,
        username,
        password,
    }
    .into())
}

fn decode_connect_ack_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    ensure!(src.remaining() >= 2, DecodeError::InvalidLength);
    let flags =
        ConnectAckFlags::from_bits(src.get_u8()).ok_or(DecodeError::ConnAckReservedFlagSet)?;
    let return_code = src.get_u8().try_into()?;
    Ok(Packet::ConnectAck(ConnectAck {
        return_code,
        session_present: flags.contains(ConnectAckFlags::SESSION_PRESENT),
    }))
}

fn decode_publish_packet(src: &mut Bytes, packet_flags: u8) -> Result<Packet, DecodeError> {
    let topic = ByteString::decode(src)?;
    validate_publish_topic(&topic)?;
    let qos = QoS::try_from((packet_flags & 0b0110) >> 1).map_err(|_| DecodeError::ReservedQos)?;
    let packet_id =
        if qos == QoS::AtMostOnce { None } else { Some(NonZeroU16::decode(src)?) };

    Ok(Packet::Publish(Publish {
        dup: (packet_flags & 0b1000) == 0b1000,
        qos,
        retain: (packet_flags & 0b0001) == 0b0001,
        topic,
        packet_id,
        // the rest of the body is the application message; taken as a shared
        // slice of the receive buffer, never copied
        payload: src.split_off(0),
    }))
}

fn decode_subscribe_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(src)?;
    let mut topic_filters = Vec::new();
    while src.has_remaining() {
        let filter = ByteString::decode(src)?;
        validate_filter(&filter)?;
        ensure!(src.has_remaining(), DecodeError::InvalidLength);
        let qos = QoS::try_from(src.get_u8()).map_err(|_| DecodeError::ReservedQos)?;
        topic_filters.push((filter, qos));
    }
    ensure!(!topic_filters.is_empty(), DecodeError::EmptyTopicFilters);

    Ok(Packet::Subscribe { packet_id, topic_filters })
}

fn decode_subscribe_ack_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(src)?;
    let mut status = Vec::with_capacity(src.remaining());
    while src.has_remaining() {
        let code = src.get_u8();
        status.push(if code == 0x80 {
            SubscribeReturnCode::Failure
        } else {
            SubscribeReturnCode::Success(
                QoS::try_from(code).map_err(|_| DecodeError::InvalidSubscribeReturnCode)?,
            )
        });
    }
    Ok(Packet::SubscribeAck { packet_id, status })
}

fn decode_unsubscribe_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(src)?;
    let mut topic_filters = Vec::new();
    while src.has_remaining() {
        let filter = ByteString::decode(src)?;
        validate_filter(&filter)?;
        topic_filters.push(filter);
    }
    ensure!(!topic_filters.is_empty(), DecodeError::EmptyTopicFilters);
    Ok(Packet::Unsubscribe { packet_id, topic_filters })
}
