use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind, ReturnCode};
use crate::frame::flags;
use crate::qos::Qos;
use crate::topic::TopicIdType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: Qos,
    pub retain: bool,
    pub topic_id_type: TopicIdType,
    /// For `Short` topics this is the 2 ASCII bytes packed big-endian, not
    /// an id allocated from a registry.
    pub topic_id: u16,
    pub msg_id: u16,
    pub data: Vec<u8>,
}

impl Publish {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 5 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "PUBLISH requires at least 5 bytes"));
        }
        let header_flags = payload.get_u8();
        let topic_id = payload.get_u16();
        let msg_id = payload.get_u16();
        let data = payload.to_vec();

        Ok(Self {
            dup: header_flags & flags::DUP != 0,
            qos: Qos::from_flags(header_flags),
            retain: header_flags & flags::RETAIN != 0,
            topic_id_type: TopicIdType::from_flags(header_flags),
            topic_id,
            msg_id,
            data,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(5 + self.data.len());
        let mut header_flags = self.qos.to_flags() | self.topic_id_type.to_flags();
        if self.dup {
            header_flags |= flags::DUP;
        }
        if self.retain {
            header_flags |= flags::RETAIN;
        }
        buf.put_u8(header_flags);
        buf.put_u16(self.topic_id);
        buf.put_u16(self.msg_id);
        buf.put_slice(&self.data);
        buf
    }
}

/// Packs a 2-ASCII-byte short topic name into the 16-bit field PUBLISH and
/// SUBSCRIBE carry it in.
pub fn pack_short_topic(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn unpack_short_topic(id: u16) -> String {
    let bytes = id.to_be_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PubAck {
    pub topic_id: u16,
    pub msg_id: u16,
    pub return_code: ReturnCode,
}

impl PubAck {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 5 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "PUBACK requires exactly 5 bytes"));
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

macro_rules! mid_only_packet {
    ($name:ident, $wire_name:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name {
            pub msg_id: u16,
        }

        impl $name {
            pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
                if payload.len() != 2 {
                    return Err(DecodeError::new(
                        DecodeErrorKind::Malformed,
                        concat!($wire_name, " requires exactly 2 bytes"),
                    ));
                }
                Ok(Self { msg_id: payload.get_u16() })
            }

            pub fn encode(&self) -> BytesMut {
                let mut buf = BytesMut::with_capacity(2);
                buf.put_u16(self.msg_id);
                buf
            }
        }
    };
}

mid_only_packet!(PubRec, "PUBREC");
mid_only_packet!(PubRel, "PUBREL");
mid_only_packet!(PubComp, "PUBCOMP");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_round_trips() {
        let p = Publish {
            dup: false,
            qos: Qos::AtLeastOnce,
            retain: false,
            topic_id_type: TopicIdType::Normal,
            topic_id: 1,
            msg_id: 42,
            data: b"23.5".to_vec(),
        };
        assert_eq!(p, Publish::decode(&p.encode()).unwrap());
    }

    #[test]
    fn publish_dup_flag_round_trips() {
        let p = Publish {
            dup: true,
            qos: Qos::ExactlyOnce,
            retain: true,
            topic_id_type: TopicIdType::Short,
            topic_id: pack_short_topic("ab").unwrap(),
            msg_id: 1,
            data: vec![],
        };
        let decoded = Publish::decode(&p.encode()).unwrap();
        assert!(decoded.dup);
        assert_eq!(decoded.qos, Qos::ExactlyOnce);
    }

    #[test]
    fn short_topic_packing_round_trips() {
        let id = pack_short_topic("ab").unwrap();
        assert_eq!(unpack_short_topic(id), "ab");
    }

    #[test]
    fn mid_only_packets_round_trip() {
        let p = PubRec { msg_id: 99 };
        assert_eq!(p, PubRec::decode(&p.encode()).unwrap());
        let p = PubRel { msg_id: 99 };
        assert_eq!(p, PubRel::decode(&p.encode()).unwrap());
        let p = PubComp { msg_id: 99 };
        assert_eq!(p, PubComp::decode(&p.encode()).unwrap());
    }
}
