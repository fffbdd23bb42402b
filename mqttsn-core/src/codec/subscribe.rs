use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind, ReturnCode};
use crate::frame::flags;
use crate::qos::Qos;
use crate::topic::TopicIdType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopicRef {
    Name(String),
    Id(u16),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
    pub dup: bool,
    pub qos: Qos,
    pub msg_id: u16,
    pub topic: TopicRef,
}

impl Subscribe {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 3 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "SUBSCRIBE requires at least 3 bytes"));
        }
        let header_flags = payload.get_u8();
        let msg_id = payload.get_u16();
        let topic_id_type = TopicIdType::from_flags(header_flags);

        let topic = match topic_id_type {
            TopicIdType::Normal => {
                let text = std::str::from_utf8(payload)
                    .map_err(|e| DecodeError::new(DecodeErrorKind::Utf8, e.to_string()))?
                    .to_string();
                TopicRef::Name(text)
            }
            TopicIdType::Predefined | TopicIdType::Short => {
                if payload.len() != 2 {
                    return Err(DecodeError::new(
                        DecodeErrorKind::Malformed,
                        "predefined/short SUBSCRIBE topic field must be 2 bytes",
                    ));
                }
                TopicRef::Id(payload.get_u16())
            }
        };

        Ok(Self {
            dup: header_flags & flags::DUP != 0,
            qos: Qos::from_reliable_u8(match header_flags & flags::QOS_NEG1 {
                flags::QOS1 => 1,
                flags::QOS2 => 2,
                _ => 0,
            })?,
            msg_id,
            topic,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let topic_id_type = match &self.topic {
            TopicRef::Name(_) => TopicIdType::Normal,
            TopicRef::Id(_) => TopicIdType::Predefined,
        };
        let mut header_flags = self.qos.to_flags() | topic_id_type.to_flags();
        if self.dup {
            header_flags |= flags::DUP;
        }
        let mut buf = BytesMut::with_capacity(3);
        buf.put_u8(header_flags);
        buf.put_u16(self.msg_id);
        match &self.topic {
            TopicRef::Name(text) => buf.put_slice(text.as_bytes()),
            TopicRef::Id(id) => buf.put_u16(*id),
        }
        buf
    }
}

pub type Unsubscribe = Subscribe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubAck {
    pub qos: Qos,
    /// `0` for a wildcard subscription that has no concrete id bound yet.
    pub topic_id: u16,
    pub msg_id: u16,
    pub return_code: ReturnCode,
}

impl SubAck {
    /// The wire spec requires exactly 6 payload bytes (8-byte frame); reject
    /// anything else rather than accepting the shorter lengths some
    /// implementations historically tolerated.
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 6 {
            return Err(DecodeError::new(
                DecodeErrorKind::Malformed,
                format!("SUBACK requires exactly 6 bytes, got {}", payload.len()),
            ));
        }
        let header_flags = payload.get_u8();
        let topic_id = payload.get_u16();
        let msg_id = payload.get_u16();
        let return_code = ReturnCode::try_from(payload.get_u8())?;
        Ok(Self {
            qos: Qos::from_flags(header_flags),
            topic_id,
            msg_id,
            return_code,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u8(self.qos.to_flags());
        buf.put_u16(self.topic_id);
        buf.put_u16(self.msg_id);
        buf.put_u8(self.return_code.into());
        buf
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsubAck {
    pub msg_id: u16,
}

impl UnsubAck {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 2 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "UNSUBACK requires exactly 2 bytes"));
        }
        Ok(Self { msg_id: payload.get_u16() })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(2);
        buf.put_u16(self.msg_id);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_with_name_round_trips() {
        let s = Subscribe { dup: false, qos: Qos::AtLeastOnce, msg_id: 4, topic: TopicRef::Name("a/b".to_string()) };
        assert_eq!(s, Subscribe::decode(&s.encode()).unwrap());
    }

    #[test]
    fn subscribe_with_predefined_id_round_trips() {
        let s = Subscribe { dup: false, qos: Qos::AtMostOnce, msg_id: 4, topic: TopicRef::Id(9) };
        assert_eq!(s, Subscribe::decode(&s.encode()).unwrap());
    }

    #[test]
    fn suback_rejects_short_payload() {
        assert!(SubAck::decode(&[0, 0, 1, 0, 1]).is_err());
    }

    #[test]
    fn suback_round_trips_at_exact_length() {
        let s = SubAck { qos: Qos::AtLeastOnce, topic_id: 1, msg_id: 9, return_code: ReturnCode::Accepted };
        assert_eq!(s, SubAck::decode(&s.encode()).unwrap());
    }
}
