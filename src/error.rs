use std::io;

/// Framing-fatal decode errors.
///
/// Each variant names the protocol rule that was violated. Any of these moves
/// the decoder into its failed state; nothing further is salvageable from the
/// byte stream and the host must close the connection.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Protocol name is not MQTT")]
    InvalidProtocol,
    #[error("Unacceptable protocol level")]
    UnsupportedProtocolLevel,
    #[error("Connect frame's reserved flag is set")]
    ConnectReservedFlagSet,
    #[error("Will qos/retain flags set without will flag")]
    WillFlagsWithoutWill,
    #[error("Password flag set without username flag")]
    PasswordWithoutUsername,
    #[error("ConnectAck frame's reserved flag is set")]
    ConnAckReservedFlagSet,
    #[error("Reserved QoS value")]
    ReservedQos,
    #[error("Zero packet id")]
    ZeroPacketId,
    #[error("Publish topic is empty")]
    EmptyTopic,
    #[error("Wildcard in publish topic")]
    WildcardInTopic,
    #[error("Invalid topic filter")]
    InvalidTopicFilter,
    #[error("Subscription carries no topic filters")]
    EmptyTopicFilters,
    #[error("Invalid subscribe return code")]
    InvalidSubscribeReturnCode,
    #[error("Declared remaining length larger than actual content")]
    RemainingLengthMismatch,
    #[error("Remaining length encoding exceeds 4 bytes")]
    RemainingLengthOverflow,
    #[error("Max frame size exceeded")]
    MaxSizeExceeded,
    #[error("Unsupported packet type")]
    UnsupportedPacketType,
    #[error("Packet type not expected from this peer")]
    UnexpectedPacket,
    #[error("Invalid length")]
    InvalidLength,
    #[error("Malformed packet")]
    MalformedPacket,
    #[error("utf8 error")]
    Utf8Error,
    #[error("io error, {:?}", _0)]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> DecodeError {
        DecodeError::Io(e)
    }
}

/// Encode errors. All are fatal for the single `encode` call that raised
/// them; the codec itself stays usable.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid length")]
    InvalidLength,
    #[error("Malformed packet")]
    MalformedPacket,
    #[error("Packet id is required")]
    PacketIdRequired,
    #[error("io error, {:?}", _0)]
    Io(io::Error),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> EncodeError {
        EncodeError::Io(e)
    }
}
