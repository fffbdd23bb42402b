use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind, ReturnCode};
use crate::frame::flags;
use crate::qos::Qos;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WillTopicReq;

impl WillTopicReq {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_empty(payload, "WILLTOPICREQ")?;
        Ok(Self)
    }

    pub fn encode(&self) -> BytesMut {
        BytesMut::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WillMsgReq;

impl WillMsgReq {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_empty(payload, "WILLMSGREQ")?;
        Ok(Self)
    }

    pub fn encode(&self) -> BytesMut {
        BytesMut::new()
    }
}

/// `topic == ""` clears the will (only meaningful while the connection is
/// mid-handshake, see `ServerEngine`'s CONNECT handler).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WillTopic {
    pub qos: Qos,
    pub retain: bool,
    pub topic: String,
}

impl WillTopic {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Ok(Self {
                qos: Qos::AtMostOnce,
                retain: false,
                topic: String::new(),
            });
        }
        let header_flags = payload.get_u8();
        let topic = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::new(DecodeErrorKind::Utf8, e.to_string()))?
            .to_string();
        Ok(Self {
            qos: Qos::from_flags(header_flags),
            retain: header_flags & flags::RETAIN != 0,
            topic,
        })
    }

    pub fn encode(&self) -> BytesMut {
        if self.topic.is_empty() {
            return BytesMut::new();
        }
        let mut buf = BytesMut::with_capacity(1 + self.topic.len());
        let mut header_flags = self.qos.to_flags();
        if self.retain {
            header_flags |= flags::RETAIN;
        }
        buf.put_u8(header_flags);
        buf.put_slice(self.topic.as_bytes());
        buf
    }
}

pub type WillTopicUpd = WillTopic;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WillMsg {
    pub message: Vec<u8>,
}

impl WillMsg {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self { message: payload.to_vec() })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.message.len());
        buf.put_slice(&self.message);
        buf
    }
}

pub type WillMsgUpd = WillMsg;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WillTopicResp {
    pub return_code: ReturnCode,
}

impl WillTopicResp {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 1 {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "WILLTOPICRESP requires 1 byte"));
        }
        Ok(Self { return_code: ReturnCode::try_from(payload[0])? })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(1);
        buf.put_u8(self.return_code.into());
        buf
    }
}

pub type WillMsgResp = WillTopicResp;

fn require_empty(payload: &[u8], name: &'static str) -> Result<(), DecodeError> {
    if !payload.is_empty() {
        return Err(DecodeError::new(
            DecodeErrorKind::Malformed,
            format!("{name} carries no payload"),
        ));
    }
    Ok(())
}
