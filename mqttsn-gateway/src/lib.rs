pub mod broker_bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod udp_link;

pub use broker_bridge::RumqttcBridge;
pub use config::GatewayConfig;
pub use engine::{ServerEngine, ServerEvent};
pub use error::ServerError;
pub use logger::GatewayLogger;
pub use udp_link::UdpLink;
