use std::fmt::{self, Display};

#[derive(Debug, Clone)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    message: String,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    FrameTooShort,
    FrameTooLong,
    NeedMore,
    UnknownMsgType,
    InvalidProtocolId,
    InvalidQos,
    InvalidReturnCode,
    InvalidFlags,
    Utf8,
    Malformed,
}

#[derive(Debug, Clone)]
pub struct EncodeError {
    kind: EncodeErrorKind,
    message: String,
}

impl EncodeError {
    pub fn new(kind: EncodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> EncodeErrorKind {
        self.kind
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EncodeError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeErrorKind {
    PayloadTooLarge,
}

/// Errors surfaced by [`crate::queue::MessageQueue`] and [`crate::topic::TopicRegistry`],
/// shared by both the client and gateway engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    QueueFull,
    NotConnected,
    PayloadTooLarge,
    UnknownGateway,
    UnknownTopic,
    Congestion,
    Timeout,
    LostContact,
}

impl Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for EngineErrorKind {}

/// Return codes carried on the wire by REGACK / PUBACK / SUBACK / CONNACK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnCode {
    Accepted = 0,
    Congestion = 1,
    InvalidTopic = 2,
    NotSupported = 3,
}

impl TryFrom<u8> for ReturnCode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::Congestion),
            2 => Ok(Self::InvalidTopic),
            3 => Ok(Self::NotSupported),
            _ => Err(DecodeError::new(
                DecodeErrorKind::InvalidReturnCode,
                format!("return code {value} is not one of the four defined values"),
            )),
        }
    }
}

impl From<ReturnCode> for u8 {
    fn from(value: ReturnCode) -> u8 {
        value as u8
    }
}

/// Internal-only marker delivered through callbacks on retry exhaustion. Never written to the wire.
pub const MSG_FAILURE: u8 = 0xFF;
