use crate::error::{DecodeError, DecodeErrorKind};
use crate::frame::flags;

/// MQTT-SN's four QoS levels. `NegOne` (unreliable, gateway-addressed
/// publish with no acknowledgment) only appears on `PUBLISH`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
    NegOne,
}

impl Qos {
    /// Decodes the 2-bit QoS field out of a flags byte.
    pub fn from_flags(byte: u8) -> Self {
        match byte & flags::QOS_NEG1 {
            flags::QOS1 => Qos::AtLeastOnce,
            flags::QOS2 => Qos::ExactlyOnce,
            flags::QOS_NEG1 => Qos::NegOne,
            _ => Qos::AtMostOnce,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => flags::QOS1,
            Qos::ExactlyOnce => flags::QOS2,
            Qos::NegOne => flags::QOS_NEG1,
        }
    }

    /// Only QoS 0-2 are valid where a reliable level is required (e.g. SUBSCRIBE).
    pub fn from_reliable_u8(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            _ => Err(DecodeError::new(
                DecodeErrorKind::InvalidQos,
                format!("qos {value} is not one of 0, 1 or 2"),
            )),
        }
    }
}
