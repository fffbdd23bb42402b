use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind, ReturnCode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Register {
    /// `0` when a client is requesting a new id; the bound id when the
    /// gateway pushes an unsolicited REGISTER.
    pub topic_id: u16,
    pub msg_id: u16,
    pub topic_name: String,
}

impl Register {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 4 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "REGISTER requires at least 4 bytes"));
        }
        let topic_id = payload.get_u16();
        let msg_id = payload.get_u16();
        let topic_name = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::new(DecodeErrorKind::Utf8, e.to_string()))?
            .to_string();
        Ok(Self { topic_id, msg_id, topic_name })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(4 + self.topic_name.len());
        buf.put_u16(self.topic_id);
        buf.put_u16(self.msg_id);
        buf.put_slice(self.topic_name.as_bytes());
        buf
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegAck {
    pub topic_id: u16,
    pub msg_id: u16,
    pub return_code: ReturnCode,
}

impl RegAck {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 5 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "REGACK requires exactly 5 bytes"));
        }
        let topic_id = payload.get_u16();
        let msg_id = payload.get_u16();
        let return_code = ReturnCode::try_from(payload.get_u8())?;
        Ok(Self { topic_id, msg_id, return_code })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u16(self.topic_id);
        buf.put_u16(self.msg_id);
        buf.put_u8(self.return_code.into());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_round_trips() {
        let r = Register { topic_id: 0, msg_id: 9, topic_name: "sensors/t".to_string() };
        assert_eq!(r, Register::decode(&r.encode()).unwrap());
    }

    #[test]
    fn regack_round_trips() {
        let r = RegAck { topic_id: 1, msg_id: 9, return_code: ReturnCode::Accepted };
        assert_eq!(r, RegAck::decode(&r.encode()).unwrap());
    }

    #[test]
    fn regack_rejects_wrong_length() {
        assert!(RegAck::decode(&[0, 1, 0, 9]).is_err());
    }
}
