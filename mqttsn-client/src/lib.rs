pub mod engine;
pub mod error;
pub mod udp_link;

pub use engine::{ClientEngine, ClientEvent};
pub use error::ClientError;
pub use udp_link::UdpLink;
