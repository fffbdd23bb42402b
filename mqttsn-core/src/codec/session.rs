use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind};

/// Carries the client id only when a gateway sends it unsolicited to probe a
/// client it suspects has gone quiet; a client's own keep-alive ping is empty.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PingReq {
    pub client_id: Option<String>,
}

impl PingReq {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Ok(Self { client_id: None });
        }
        let client_id = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::new(DecodeErrorKind::Utf8, e.to_string()))?
            .to_string();
        Ok(Self { client_id: Some(client_id) })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        if let Some(client_id) = &self.client_id {
            buf.put_slice(client_id.as_bytes());
        }
        buf
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PingResp;

impl PingResp {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if !payload.is_empty() {
            return Err(DecodeError::new(DecodeErrorKind::Malformed, "PINGRESP carries no payload"));
        }
        Ok(Self)
    }

    pub fn encode(&self) -> BytesMut {
        BytesMut::new()
    }
}

/// `duration` is only present when a client is requesting to go to sleep
/// rather than disconnecting outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Disconnect {
    pub duration: Option<u16>,
}

impl Disconnect {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        match payload.len() {
            0 => Ok(Self { duration: None }),
            2 => Ok(Self { duration: Some(payload.get_u16()) }),
            _ => Err(DecodeError::new(DecodeErrorKind::Malformed, "DISCONNECT duration must be 0 or 2 bytes")),
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        if let Some(duration) = self.duration {
            buf.put_u16(duration);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pingreq_round_trips_with_and_without_client_id() {
        let p = PingReq { client_id: None };
        assert_eq!(p, PingReq::decode(&p.encode()).unwrap());
        let p = PingReq { client_id: Some("sensor-1".to_string()) };
        assert_eq!(p, PingReq::decode(&p.encode()).unwrap());
    }

    #[test]
    fn pingresp_rejects_nonempty_payload() {
        assert!(PingResp::decode(&[1]).is_err());
    }

    #[test]
    fn disconnect_round_trips_with_and_without_duration() {
        let d = Disconnect { duration: None };
        assert_eq!(d, Disconnect::decode(&d.encode()).unwrap());
        let d = Disconnect { duration: Some(300) };
        assert_eq!(d, Disconnect::decode(&d.encode()).unwrap());
    }
}
