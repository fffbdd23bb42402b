use std::fmt::{self, Display};

use mqttsn_core::error::EngineErrorKind;
use mqttsn_core::DecodeError;

#[derive(Debug, Clone)]
pub enum ServerError {
    Decode(DecodeError),
    Engine(EngineErrorKind),
    /// The connection table is at `max_connections` and a new peer arrived.
    TableFull,
}

impl From<DecodeError> for ServerError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<EngineErrorKind> for ServerError {
    fn from(value: EngineErrorKind) -> Self {
        Self::Engine(value)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Decode(e) => write!(f, "decode error: {e}"),
            ServerError::Engine(e) => write!(f, "engine error: {e}"),
            ServerError::TableFull => write!(f, "connection table is full"),
        }
    }
}

impl std::error::Error for ServerError {}
