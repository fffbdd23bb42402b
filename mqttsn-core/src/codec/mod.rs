//! Per-message-type encode/decode, one submodule per wire message grouped the
//! way the spec groups them. [`Message`] aggregates all of them into a single
//! enum so callers can dispatch on `MsgType` once and match on the result.

pub mod connect;
pub mod discovery;
pub mod publish;
pub mod register;
pub mod session;
pub mod subscribe;
pub mod will;

use crate::error::{DecodeError, DecodeErrorKind, EncodeError};
use crate::frame::MsgType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Advertise(discovery::Advertise),
    SearchGw(discovery::SearchGw),
    GwInfo(discovery::GwInfo),
    Connect(connect::Connect),
    ConnAck(connect::ConnAck),
    WillTopicReq(will::WillTopicReq),
    WillTopic(will::WillTopic),
    WillMsgReq(will::WillMsgReq),
    WillMsg(will::WillMsg),
    Register(register::Register),
    RegAck(register::RegAck),
    Publish(publish::Publish),
    PubAck(publish::PubAck),
    PubComp(publish::PubComp),
    PubRec(publish::PubRec),
    PubRel(publish::PubRel),
    Subscribe(subscribe::Subscribe),
    SubAck(subscribe::SubAck),
    Unsubscribe(subscribe::Unsubscribe),
    UnsubAck(subscribe::UnsubAck),
    PingReq(session::PingReq),
    PingResp(session::PingResp),
    Disconnect(session::Disconnect),
    WillTopicUpd(will::WillTopicUpd),
    WillTopicResp(will::WillTopicResp),
    WillMsgUpd(will::WillMsgUpd),
    WillMsgResp(will::WillMsgResp),
}

impl Message {
    pub fn msg_type(&self) -> MsgType {
        match self {
            Message::Advertise(_) => MsgType::Advertise,
            Message::SearchGw(_) => MsgType::SearchGw,
            Message::GwInfo(_) => MsgType::GwInfo,
            Message::Connect(_) => MsgType::Connect,
            Message::ConnAck(_) => MsgType::ConnAck,
            Message::WillTopicReq(_) => MsgType::WillTopicReq,
            Message::WillTopic(_) => MsgType::WillTopic,
            Message::WillMsgReq(_) => MsgType::WillMsgReq,
            Message::WillMsg(_) => MsgType::WillMsg,
            Message::Register(_) => MsgType::Register,
            Message::RegAck(_) => MsgType::RegAck,
            Message::Publish(_) => MsgType::Publish,
            Message::PubAck(_) => MsgType::PubAck,
            Message::PubComp(_) => MsgType::PubComp,
            Message::PubRec(_) => MsgType::PubRec,
            Message::PubRel(_) => MsgType::PubRel,
            Message::Subscribe(_) => MsgType::Subscribe,
            Message::SubAck(_) => MsgType::SubAck,
            Message::Unsubscribe(_) => MsgType::Unsubscribe,
            Message::UnsubAck(_) => MsgType::UnsubAck,
            Message::PingReq(_) => MsgType::PingReq,
            Message::PingResp(_) => MsgType::PingResp,
            Message::Disconnect(_) => MsgType::Disconnect,
            Message::WillTopicUpd(_) => MsgType::WillTopicUpd,
            Message::WillTopicResp(_) => MsgType::WillTopicResp,
            Message::WillMsgUpd(_) => MsgType::WillMsgUpd,
            Message::WillMsgResp(_) => MsgType::WillMsgResp,
        }
    }

    /// Decodes a frame's payload given the raw msgtype byte already split off
    /// by [`crate::frame::decode_header`]. Unknown msgtype bytes are the
    /// caller's concern (treated as "ignore this frame"), not this function's.
    pub fn decode(msgtype: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        let msg_type = MsgType::from_u8(msgtype).ok_or_else(|| {
            DecodeError::new(DecodeErrorKind::UnknownMsgType, format!("unknown msgtype 0x{msgtype:02X}"))
        })?;

        Ok(match msg_type {
            MsgType::Advertise => Message::Advertise(discovery::Advertise::decode(payload)?),
            MsgType::SearchGw => Message::SearchGw(discovery::SearchGw::decode(payload)?),
            MsgType::GwInfo => Message::GwInfo(discovery::GwInfo::decode(payload)?),
            MsgType::Connect => Message::Connect(connect::Connect::decode(payload)?),
            MsgType::ConnAck => Message::ConnAck(connect::ConnAck::decode(payload)?),
            MsgType::WillTopicReq => Message::WillTopicReq(will::WillTopicReq::decode(payload)?),
            MsgType::WillTopic => Message::WillTopic(will::WillTopic::decode(payload)?),
            MsgType::WillMsgReq => Message::WillMsgReq(will::WillMsgReq::decode(payload)?),
            MsgType::WillMsg => Message::WillMsg(will::WillMsg::decode(payload)?),
            MsgType::Register => Message::Register(register::Register::decode(payload)?),
            MsgType::RegAck => Message::RegAck(register::RegAck::decode(payload)?),
            MsgType::Publish => Message::Publish(publish::Publish::decode(payload)?),
            MsgType::PubAck => Message::PubAck(publish::PubAck::decode(payload)?),
            MsgType::PubComp => Message::PubComp(publish::PubComp::decode(payload)?),
            MsgType::PubRec => Message::PubRec(publish::PubRec::decode(payload)?),
            MsgType::PubRel => Message::PubRel(publish::PubRel::decode(payload)?),
            MsgType::Subscribe => Message::Subscribe(subscribe::Subscribe::decode(payload)?),
            MsgType::SubAck => Message::SubAck(subscribe::SubAck::decode(payload)?),
            MsgType::Unsubscribe => Message::Unsubscribe(subscribe::Unsubscribe::decode(payload)?),
            MsgType::UnsubAck => Message::UnsubAck(subscribe::UnsubAck::decode(payload)?),
            MsgType::PingReq => Message::PingReq(session::PingReq::decode(payload)?),
            MsgType::PingResp => Message::PingResp(session::PingResp::decode(payload)?),
            MsgType::Disconnect => Message::Disconnect(session::Disconnect::decode(payload)?),
            MsgType::WillTopicUpd => Message::WillTopicUpd(will::WillTopicUpd::decode(payload)?),
            MsgType::WillTopicResp => Message::WillTopicResp(will::WillTopicResp::decode(payload)?),
            MsgType::WillMsgUpd => Message::WillMsgUpd(will::WillMsgUpd::decode(payload)?),
            MsgType::WillMsgResp => Message::WillMsgResp(will::WillMsgResp::decode(payload)?),
        })
    }

    pub fn encode_payload(&self) -> bytes::BytesMut {
        match self {
            Message::Advertise(m) => m.encode(),
            Message::SearchGw(m) => m.encode(),
            Message::GwInfo(m) => m.encode(),
            Message::Connect(m) => m.encode(),
            Message::ConnAck(m) => m.encode(),
            Message::WillTopicReq(m) => m.encode(),
            Message::WillTopic(m) => m.encode(),
            Message::WillMsgReq(m) => m.encode(),
            Message::WillMsg(m) => m.encode(),
            Message::Register(m) => m.encode(),
            Message::RegAck(m) => m.encode(),
            Message::Publish(m) => m.encode(),
            Message::PubAck(m) => m.encode(),
            Message::PubComp(m) => m.encode(),
            Message::PubRec(m) => m.encode(),
            Message::PubRel(m) => m.encode(),
            Message::Subscribe(m) => m.encode(),
            Message::SubAck(m) => m.encode(),
            Message::Unsubscribe(m) => m.encode(),
            Message::UnsubAck(m) => m.encode(),
            Message::PingReq(m) => m.encode(),
            Message::PingResp(m) => m.encode(),
            Message::Disconnect(m) => m.encode(),
            Message::WillTopicUpd(m) => m.encode(),
            Message::WillTopicResp(m) => m.encode(),
            Message::WillMsgUpd(m) => m.encode(),
            Message::WillMsgResp(m) => m.encode(),
        }
    }

    /// Encodes a full `[len][msgtype][payload]` frame, enforcing both the
    /// 255-byte wire ceiling and the link's own MTU.
    pub fn encode_frame(&self, max_payload: u8) -> Result<Vec<u8>, EncodeError> {
        let payload = self.encode_payload();
        crate::frame::encode(self.msg_type() as u8, &payload, max_payload)
    }
}
