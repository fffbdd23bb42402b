//! Shared MQTT-SN primitives: wire codec, topic registry, message queue and
//! connection state machine used by both `mqttsn-client` and
//! `mqttsn-gateway`, plus the two traits ([`PacketLink`], [`BrokerBridge`])
//! that let each crate plug in its own transport and upstream broker.

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod gateway_table;
pub mod qos;
pub mod queue;
pub mod topic;

pub use codec::Message;
pub use connection::{ConnState, Connection};
pub use error::{DecodeError, EncodeError, EngineErrorKind};
pub use frame::MsgType;
pub use gateway_table::GatewayTable;
pub use qos::Qos;
pub use queue::MessageQueue;
pub use topic::TopicRegistry;

/// A transport capable of carrying MQTT-SN frames: UDP, a serial link, BLE,
/// whatever the deployment needs. Implementations own their own I/O and
/// deliver received frames back to the engine via `on_received`; they are
/// never assumed to be TCP-like or ordered.
pub trait PacketLink {
    /// Largest frame this link can carry in one shot, including the 2-byte
    /// header. Never exceeds [`frame::MAX_FRAME_LEN`].
    fn payload_width(&self) -> u8;

    /// Length in bytes of this link's addresses (e.g. 4 for IPv4:port encoded
    /// compactly, 6 for a BLE MAC). `0` means the link has no addressing
    /// concept (a single point-to-point serial line).
    fn address_len(&self) -> u8;

    /// The address frames are sent to for SEARCHGW and similar broadcast-only
    /// procedures; empty if the link has no broadcast concept.
    fn broadcast_address(&self) -> &[u8];

    /// Sends a complete, already-encoded frame to `dest_addr`. Returns `false`
    /// on any transport-level failure to enqueue the bytes; the caller treats
    /// `false` the same as "dropped on the wire", not as an error to surface.
    fn send(&mut self, dest_addr: &[u8], frame: &[u8]) -> bool;

    /// Drains frames received since the last call, each paired with the
    /// address they arrived from. Implementations that are push-based
    /// (callback-driven sockets) buffer internally and hand them back here.
    fn poll_received(&mut self) -> Vec<(Vec<u8>, Vec<u8>)>;

    fn shutdown(&mut self);
}

/// What a gateway needs from an upstream MQTT broker connection: publish,
/// (un)subscribe, and delivery of broker-originated events back to the
/// gateway engine. Never implemented in `mqttsn-core` itself — the gateway
/// crate owns the concrete broker client.
pub trait BrokerBridge {
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> bool;
    fn subscribe(&mut self, topic_filter: &str, qos: Qos) -> bool;
    fn unsubscribe(&mut self, topic_filter: &str) -> bool;

    /// Drains broker-originated events (incoming PUBLISH, ack confirmations,
    /// connection state changes) since the last call.
    fn poll_events(&mut self) -> Vec<BrokerEvent>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected,
    Disconnected,
    Published { topic: String, payload: Vec<u8>, qos: Qos, retain: bool },
    PublishAcked { local_id: u16 },
    SubscribeAcked { local_id: u16, granted_qos: Qos },
    UnsubscribeAcked { local_id: u16 },
}
