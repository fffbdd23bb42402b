use std::fmt::{self, Display};

use mqttsn_core::error::EngineErrorKind;
use mqttsn_core::DecodeError;

#[derive(Debug, Clone)]
pub enum ClientError {
    Decode(DecodeError),
    Engine(EngineErrorKind),
    /// No gateway in the table is currently considered live.
    NoGateway,
    /// `connect`/`register`/`subscribe` was called before CONNACK arrived.
    NotConnected,
}

impl From<DecodeError> for ClientError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<EngineErrorKind> for ClientError {
    fn from(value: EngineErrorKind) -> Self {
        Self::Engine(value)
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Decode(e) => write!(f, "decode error: {e}"),
            ClientError::Engine(e) => write!(f, "engine error: {e}"),
            ClientError::NoGateway => write!(f, "no live gateway known"),
            ClientError::NotConnected => write!(f, "not connected to a gateway"),
        }
    }
}

impl std::error::Error for ClientError {}
