//! Raw `[len][msgtype][payload]` framing, shared by every message codec in
//! [`crate::codec`]. Grounded on the teacher's `mqtt-core/src/io.rs` — pure
//! functions over byte slices, no allocation beyond what the caller supplies.

use crate::error::{DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind};

/// Every frame counts its own length byte, so the smallest legal frame is
/// `[len=2][msgtype]` with an empty payload.
pub const MIN_FRAME_LEN: usize = 2;

/// `len` is a single byte; a frame can never exceed this on the wire.
pub const MAX_FRAME_LEN: usize = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MsgType {
    Advertise = 0x00,
    SearchGw = 0x01,
    GwInfo = 0x02,
    Connect = 0x04,
    ConnAck = 0x05,
    WillTopicReq = 0x06,
    WillTopic = 0x07,
    WillMsgReq = 0x08,
    WillMsg = 0x09,
    Register = 0x0A,
    RegAck = 0x0B,
    Publish = 0x0C,
    PubAck = 0x0D,
    PubComp = 0x0E,
    PubRec = 0x0F,
    PubRel = 0x10,
    Subscribe = 0x12,
    SubAck = 0x13,
    Unsubscribe = 0x14,
    UnsubAck = 0x15,
    PingReq = 0x16,
    PingResp = 0x17,
    Disconnect = 0x18,
    WillTopicUpd = 0x1A,
    WillTopicResp = 0x1B,
    WillMsgUpd = 0x1C,
    WillMsgResp = 0x1D,
}

impl MsgType {
    /// Returns `None` for any byte outside the enumerated set; callers treat
    /// that as an "unknown frame" to be ignored rather than a decode error.
    pub fn from_u8(value: u8) -> Option<Self> {
        use MsgType::*;
        let out = match value {
            0x00 => Advertise,
            0x01 => SearchGw,
            0x02 => GwInfo,
            0x04 => Connect,
            0x05 => ConnAck,
            0x06 => WillTopicReq,
            0x07 => WillTopic,
            0x08 => WillMsgReq,
            0x09 => WillMsg,
            0x0A => Register,
            0x0B => RegAck,
            0x0C => Publish,
            0x0D => PubAck,
            0x0E => PubComp,
            0x0F => PubRec,
            0x10 => PubRel,
            0x12 => Subscribe,
            0x13 => SubAck,
            0x14 => Unsubscribe,
            0x15 => UnsubAck,
            0x16 => PingReq,
            0x17 => PingResp,
            0x18 => Disconnect,
            0x1A => WillTopicUpd,
            0x1B => WillTopicResp,
            0x1C => WillMsgUpd,
            0x1D => WillMsgResp,
            _ => return None,
        };
        Some(out)
    }
}

pub mod flags {
    pub const DUP: u8 = 0x80;
    pub const QOS2: u8 = 0x40;
    pub const QOS1: u8 = 0x20;
    pub const QOS_NEG1: u8 = 0x60;
    pub const RETAIN: u8 = 0x10;
    pub const WILL: u8 = 0x08;
    pub const CLEAN_SESSION: u8 = 0x04;
    pub const SHORT_TOPIC: u8 = 0x02;
    pub const DEFINED_TOPIC: u8 = 0x01;
}

/// Result of peeking at a byte buffer that may not yet hold a whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLen {
    /// Full frame length, including the length byte itself.
    Len(usize),
    /// Fewer than [`MIN_FRAME_LEN`] bytes are available so far.
    NeedMore,
}

/// Reads the length byte off the front of `buf`. Does not validate that
/// `buf` actually holds that many bytes.
pub fn frame_len(buf: &[u8]) -> FrameLen {
    if buf.is_empty() {
        return FrameLen::NeedMore;
    }
    FrameLen::Len(buf[0] as usize)
}

/// Splits a complete frame into its message type and payload slice.
///
/// Rejects frames shorter than [`MIN_FRAME_LEN`] and frames whose declared
/// length exceeds `buf.len()` or `MAX_FRAME_LEN`.
pub fn decode_header(buf: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(DecodeError::new(
            DecodeErrorKind::FrameTooShort,
            format!("frame of {} bytes is shorter than the 2-byte minimum", buf.len()),
        ));
    }

    let len = buf[0] as usize;
    if len > MAX_FRAME_LEN {
        return Err(DecodeError::new(
            DecodeErrorKind::FrameTooLong,
            format!("declared length {len} exceeds the 255-byte wire maximum"),
        ));
    }
    if len > buf.len() {
        return Err(DecodeError::new(
            DecodeErrorKind::FrameTooShort,
            format!("declared length {len} exceeds the {} bytes available", buf.len()),
        ));
    }

    let msgtype = buf[1];
    let payload = &buf[2..len];
    Ok((msgtype, payload))
}

/// Encodes a complete frame ready to hand to a [`crate::PacketLink`].
pub fn encode(msgtype: u8, payload: &[u8], max_payload: u8) -> Result<Vec<u8>, EncodeError> {
    let total_len = payload.len() + 2;
    if total_len > MAX_FRAME_LEN || total_len > max_payload as usize {
        return Err(EncodeError::new(
            EncodeErrorKind::PayloadTooLarge,
            format!("frame of {total_len} bytes exceeds the link's {max_payload}-byte payload width"),
        ));
    }

    let mut out = Vec::with_capacity(total_len);
    out.push(total_len as u8);
    out.push(msgtype);
    out.extend_from_slice(payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_len_needs_more_on_empty_buffer() {
        assert_eq!(frame_len(&[]), FrameLen::NeedMore);
    }

    #[test]
    fn decode_header_rejects_short_frame() {
        assert!(decode_header(&[1]).is_err());
    }

    #[test]
    fn decode_header_rejects_declared_length_past_buffer() {
        assert!(decode_header(&[10, 0x16]).is_err());
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let frame = encode(0x16, &[1, 2, 3], 255).unwrap();
        let (msgtype, payload) = decode_header(&frame).unwrap();
        assert_eq!(msgtype, 0x16);
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn encode_rejects_oversized_payload_for_link_width() {
        assert!(encode(0x0C, &[0u8; 40], 32).is_err());
    }

    #[test]
    fn msgtype_from_u8_rejects_unknown_values() {
        assert!(MsgType::from_u8(0x03).is_none());
        assert_eq!(MsgType::from_u8(0x0C), Some(MsgType::Publish));
    }
}
