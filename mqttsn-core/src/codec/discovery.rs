use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertise {
    pub gw_id: u8,
    pub duration: u16,
}

impl Advertise {
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 3 {
            return Err(DecodeError::new(
                DecodeErrorKind::Malformed,
                "ADVERTISE requires exactly 3 bytes",
            ));
        }
        let gw_id = payload.get_u8();
        let duration = payload.get_u16();
        Ok(Self { gw_id, duration })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(3);
        buf.put_u8(self.gw_id);
        buf.put_u16(self.duration);
        buf
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchGw {
    pub radius: u8,
}

impl SearchGw {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 1 {
            return Err(DecodeError::new(
                DecodeErrorKind::Malformed,
                "SEARCHGW requires exactly 1 byte",
            ));
        }
        Ok(Self { radius: payload[0] })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(1);
        buf.put_u8(self.radius);
        buf
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GwInfo {
    pub gw_id: u8,
    /// Present only when a client relays GWINFO on SEARCHGW's behalf; empty
    /// when the gateway answers directly (the frame's source address is used).
    pub gw_add: Vec<u8>,
}

impl GwInfo {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::new(
                DecodeErrorKind::Malformed,
                "GWINFO requires at least 1 byte",
            ));
        }
        Ok(Self {
            gw_id: payload[0],
            gw_add: payload[1..].to_vec(),
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(1 + self.gw_add.len());
        buf.put_u8(self.gw_id);
        buf.put_slice(&self.gw_add);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertise_round_trips() {
        let a = Advertise { gw_id: 7, duration: 1500 };
        let decoded = Advertise::decode(&a.encode()).unwrap();
        assert_eq!(a, decoded);
    }

    #[test]
    fn gwinfo_round_trips_with_and_without_address() {
        let g = GwInfo { gw_id: 7, gw_add: vec![] };
        assert_eq!(g, GwInfo::decode(&g.encode()).unwrap());

        let g = GwInfo { gw_id: 7, gw_add: vec![192, 168, 1, 1] };
        assert_eq!(g, GwInfo::decode(&g.encode()).unwrap());
    }
}
