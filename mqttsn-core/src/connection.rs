//! Per-peer connection state: the Disconnected/Connecting/Connected/Asleep
//! machine, keep-alive bookkeeping, will data, and the owned topic registry
//! and message queue for that peer.
//!
//! Grounded on the teacher's `mqtt-broker/src/session.rs`
//! (`ActiveSession`/`DisconnectedSession` pairing a peer's retry state with
//! its subscriptions), generalized here to also carry MQTT-SN's sleep state
//! and will handshake fields that plain MQTT sessions don't need.

use std::time::{Duration, Instant};

use crate::qos::Qos;
use crate::queue::MessageQueue;
use crate::topic::TopicRegistry;

/// Will payload fields are length-limited the same way client ids are, so a
/// malformed/oversized WILLTOPIC or WILLMSG can be rejected before it is
/// ever placed on the wire.
pub const MAX_WILL_TOPIC_LEN: usize = 251;
pub const MAX_WILL_MSG_LEN: usize = 251;
pub const MAX_CLIENT_ID_LEN: usize = 23;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Asleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    ClientIdTooLong,
    WillTopicTooLong,
    WillMsgTooLong,
}

/// One peer's full session state. `address` is opaque because MQTT-SN runs
/// over arbitrary packet links (UDP, serial, BLE, ...); the engine compares
/// it with [`Connection::address_matches`] rather than assuming any structure.
#[derive(Debug)]
pub struct Connection {
    address: Vec<u8>,
    client_id: String,
    state: ConnState,
    keep_alive: Duration,
    last_activity: Option<Instant>,
    last_ping: Option<Instant>,
    sleep_duration: Option<Duration>,
    asleep_from: Option<Instant>,
    clean_session: bool,
    resume_topics: bool,
    will_topic: Option<String>,
    will_qos: Qos,
    will_retain: bool,
    will_message: Vec<u8>,
    gateway_id: Option<u8>,
    topics: TopicRegistry,
    queue: MessageQueue,
}

impl Connection {
    pub fn new(address: Vec<u8>, client_id: String, keep_alive: Duration) -> Self {
        Self {
            address,
            client_id,
            state: ConnState::Disconnected,
            keep_alive,
            last_activity: None,
            last_ping: None,
            sleep_duration: None,
            asleep_from: None,
            clean_session: true,
            resume_topics: false,
            will_topic: None,
            will_qos: Qos::AtMostOnce,
            will_retain: false,
            will_message: Vec::new(),
            gateway_id: None,
            topics: TopicRegistry::new(),
            queue: MessageQueue::default(),
        }
    }

    pub fn address(&self) -> &[u8] {
        &self.address
    }

    pub fn address_matches(&self, addr: &[u8]) -> bool {
        self.address == addr
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnState) {
        self.state = state;
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: Duration) {
        self.keep_alive = keep_alive;
    }

    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    pub fn set_clean_session(&mut self, clean_session: bool) {
        self.clean_session = clean_session;
        if clean_session {
            self.topics.free_all();
        }
    }

    pub fn resume_topics(&self) -> bool {
        self.resume_topics
    }

    pub fn set_resume_topics(&mut self, resume: bool) {
        self.resume_topics = resume;
    }

    pub fn gateway_id(&self) -> Option<u8> {
        self.gateway_id
    }

    pub fn set_gateway_id(&mut self, id: u8) {
        self.gateway_id = Some(id);
    }

    pub fn topics(&self) -> &TopicRegistry {
        &self.topics
    }

    pub fn topics_mut(&mut self) -> &mut TopicRegistry {
        &mut self.topics
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MessageQueue {
        &mut self.queue
    }

    pub fn update_activity(&mut self, now: Instant) {
        self.last_activity = Some(now);
        self.last_ping = Some(now);
    }

    pub fn update_ping(&mut self, now: Instant) {
        self.last_ping = Some(now);
    }

    /// True once `now` is more than `5 * keep_alive` past the last observed
    /// activity, the duration after which the peer is declared unreachable.
    pub fn lost_contact(&self, now: Instant) -> bool {
        match self.last_activity {
            Some(last) => now.duration_since(last) > self.keep_alive * 5,
            None => false,
        }
    }

    /// True once `now` is more than one keep-alive interval past the last
    /// ping, i.e. it is time to send another keep-alive probe.
    pub fn send_another_ping(&self, now: Instant) -> bool {
        match self.last_ping {
            Some(last) => now.duration_since(last) > self.keep_alive,
            None => true,
        }
    }

    pub fn enter_sleep(&mut self, duration: Duration, now: Instant) {
        self.state = ConnState::Asleep;
        self.sleep_duration = Some(duration);
        self.asleep_from = Some(now);
    }

    pub fn sleep_expired(&self, now: Instant) -> bool {
        match (self.sleep_duration, self.asleep_from) {
            (Some(dur), Some(from)) => now.duration_since(from) > dur,
            _ => false,
        }
    }

    pub fn will_topic(&self) -> Option<&str> {
        self.will_topic.as_deref()
    }

    pub fn will_qos(&self) -> Qos {
        self.will_qos
    }

    pub fn will_retain(&self) -> bool {
        self.will_retain
    }

    pub fn will_message(&self) -> &[u8] {
        &self.will_message
    }

    pub fn set_client_id(&mut self, client_id: String) -> Result<(), ConnectionError> {
        if client_id.len() > MAX_CLIENT_ID_LEN {
            return Err(ConnectionError::ClientIdTooLong);
        }
        self.client_id = client_id;
        Ok(())
    }

    /// An empty `topic` clears a previously set will, matching the wire
    /// convention used by WILLTOPIC/WILLTOPICUPD.
    pub fn set_will_topic(&mut self, topic: String, qos: Qos, retain: bool) -> Result<(), ConnectionError> {
        if topic.len() > MAX_WILL_TOPIC_LEN {
            return Err(ConnectionError::WillTopicTooLong);
        }
        self.will_qos = qos;
        self.will_retain = retain;
        self.will_topic = if topic.is_empty() { None } else { Some(topic) };
        Ok(())
    }

    pub fn set_will_message(&mut self, message: Vec<u8>) -> Result<(), ConnectionError> {
        if message.len() > MAX_WILL_MSG_LEN {
            return Err(ConnectionError::WillMsgTooLong);
        }
        self.will_message = message;
        Ok(())
    }

    pub fn clear_will(&mut self) {
        self.will_topic = None;
        self.will_message.clear();
        self.will_qos = Qos::AtMostOnce;
        self.will_retain = false;
    }
}
