use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind, ReturnCode};
use crate::frame::flags;

pub const PROTOCOL_ID: u8 = 0x01;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connect {
    pub will: bool,
    pub clean_session: bool,
    pub duration: u16,
    pub client_id: String,
}

impl Connect {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 4 {
            return Err(DecodeError::new(
                DecodeErrorKind::Malformed,
                "CONNECT requires at least 4 bytes",
            ));
        }
        let header_flags = payload.get_u8();
        let protocol_id = payload.get_u8();
        if protocol_id != PROTOCOL_ID {
            return Err(DecodeError::new(
                DecodeErrorKind::InvalidProtocolId,
                format!("protocol id {protocol_id} does not match the required 0x01"),
            ));
        }
        let duration = payload.get_u16();
        let client_id = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::new(DecodeErrorKind::Utf8, e.to_string()))?
            .to_string();

        Ok(Self {
            will: header_flags & flags::WILL != 0,
            clean_session: header_flags & flags::CLEAN_SESSION != 0,
            duration,
            client_id,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(4 + self.client_id.len());
        let mut header_flags = 0u8;
        if self.will {
            header_flags |= flags::WILL;
        }
        if self.clean_session {
            header_flags |= flags::CLEAN_SESSION;
        }
        buf.put_u8(header_flags);
        buf.put_u8(PROTOCOL_ID);
        buf.put_u16(self.duration);
        buf.put_slice(self.client_id.as_bytes());
        buf
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnAck {
    pub return_code: ReturnCode,
}

impl ConnAck {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 1 {
            return Err(DecodeError::new(
                DecodeErrorKind::Malformed,
                "CONNACK requires exactly 1 byte",
            ));
        }
        Ok(Self {
            return_code: ReturnCode::try_from(payload[0])?,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(1);
        buf.put_u8(self.return_code.into());
        buf
    }
}
