//! The gateway-side state machine: one [`Connection`] per MQTT-SN peer,
//! fanned out to/from a single upstream [`BrokerBridge`].
//!
//! Grounded on the teacher's `mqtt-broker/src/session.rs` (per-peer session
//! table keyed by connection) and `mqtt-broker/src/topic.rs` (broadcasting a
//! broker-side publish out to every matching subscriber), generalized to
//! MQTT-SN's id-registration and sleep/buffering requirements.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use mqttsn_core::codec::connect::ConnAck;
use mqttsn_core::codec::discovery::{Advertise, GwInfo};
use mqttsn_core::codec::publish::{unpack_short_topic, PubAck, PubComp, PubRec, Publish};
use mqttsn_core::codec::register::{RegAck, Register};
use mqttsn_core::codec::session::{Disconnect, PingResp};
use mqttsn_core::codec::subscribe::{SubAck, TopicRef, UnsubAck};
use mqttsn_core::codec::will::{WillMsgReq, WillTopicReq};
use mqttsn_core::connection::ConnState;
use mqttsn_core::error::ReturnCode;
use mqttsn_core::frame::{self};
use mqttsn_core::queue::Activity;
use mqttsn_core::topic::TopicIdType;
use mqttsn_core::{BrokerBridge, BrokerEvent, Connection, Message, PacketLink, Qos};

use crate::error::ServerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    PeerConnected { address: Vec<u8>, client_id: String },
    PeerLost { address: Vec<u8> },
    PeerDisconnected { address: Vec<u8> },
}

/// Per-peer state beyond what [`Connection`] tracks: frames queued while the
/// peer is asleep, delivered one at a time as it pings, and topic ids still
/// awaiting a resume-REGISTER after a `clean=0` reconnect.
struct Peer {
    conn: Connection,
    sleep_buffer: VecDeque<Vec<u8>>,
    resume_pending: VecDeque<u16>,
}

fn resolve_topic_text(peer: &Peer, topic_id_type: TopicIdType, topic_id: u16) -> Option<String> {
    match topic_id_type {
        TopicIdType::Short => Some(unpack_short_topic(topic_id)),
        TopicIdType::Normal | TopicIdType::Predefined => peer.conn.topics().get_topic_by_id(topic_id).map(|t| t.text().to_string()),
    }
}

pub struct ServerEngine<L: PacketLink, B: BrokerBridge> {
    link: L,
    broker: B,
    gw_id: u8,
    advertise_duration: Duration,
    last_advertise: Option<Instant>,
    peers: HashMap<Vec<u8>, Peer>,
    max_connections: usize,
    events: VecDeque<ServerEvent>,
}

impl<L: PacketLink, B: BrokerBridge> ServerEngine<L, B> {
    pub fn new(link: L, broker: B, gw_id: u8, advertise_duration: Duration, max_connections: usize) -> Self {
        Self {
            link,
            broker,
            gw_id,
            advertise_duration,
            last_advertise: None,
            peers: HashMap::new(),
            max_connections,
            events: VecDeque::new(),
        }
    }

    pub fn events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.events.drain(..)
    }

    fn send(&mut self, dest: &[u8], msg: &Message) {
        if let Ok(frame) = msg.encode_frame(self.link.payload_width()) {
            self.link.send(dest, &frame);
        }
    }

    pub fn handle_received(&mut self, from: Vec<u8>, msgtype: u8, payload: &[u8], now: Instant) -> Result<(), ServerError> {
        let msg = Message::decode(msgtype, payload)?;

        if let Message::SearchGw(_) = &msg {
            self.send(&from, &Message::GwInfo(GwInfo { gw_id: self.gw_id, gw_add: Vec::new() }));
            return Ok(());
        }

        if let Message::Connect(connect) = &msg {
            if !self.peers.contains_key(&from) && self.peers.len() >= self.max_connections {
                return Err(ServerError::TableFull);
            }
            let peer = self.peers.entry(from.clone()).or_insert_with(|| Peer {
                conn: Connection::new(from.clone(), connect.client_id.clone(), Duration::from_secs(connect.duration as u64)),
                sleep_buffer: VecDeque::new(),
                resume_pending: VecDeque::new(),
            });
            peer.conn.set_keep_alive(Duration::from_secs(connect.duration.max(1) as u64));
            peer.conn.set_clean_session(connect.clean_session);
            peer.conn.set_resume_topics(!connect.clean_session);
            let _ = peer.conn.set_client_id(connect.client_id.clone());
            peer.conn.set_state(ConnState::Connecting);
            peer.conn.update_activity(now);

            if connect.will {
                self.send(&from, &Message::WillTopicReq(WillTopicReq));
            } else {
                self.accept_connection(&from, now);
            }
            return Ok(());
        }

        let Some(peer) = self.peers.get_mut(&from) else {
            return Ok(()); // unknown peer sending anything but CONNECT/SEARCHGW is ignored
        };
        peer.conn.update_activity(now);

        match msg {
            Message::WillTopic(wt) => {
                peer.conn.set_will_topic(wt.topic, wt.qos, wt.retain).ok();
                self.send(&from, &Message::WillMsgReq(WillMsgReq));
            }
            Message::WillMsg(wm) => {
                peer.conn.set_will_message(wm.message).ok();
                self.accept_connection(&from, now);
            }
            Message::Register(reg) => {
                self.handle_register(&from, reg, now);
            }
            Message::RegAck(ack) => {
                // Ack of a gateway-initiated REGISTER (resume replay, or a
                // wildcard fan-out registration); rc is not retried beyond
                // the queue's own retry law.
                peer.conn.queue_mut().complete(ack.msg_id);
            }
            Message::Publish(p) => {
                self.handle_publish(&from, p);
            }
            Message::PubRel(rel) => {
                self.send(&from, &Message::PubComp(PubComp { msg_id: rel.msg_id }));
            }
            Message::Subscribe(sub) => {
                self.handle_subscribe(&from, sub.topic, sub.qos, sub.msg_id, now);
            }
            Message::Unsubscribe(unsub) => {
                self.handle_unsubscribe(&from, unsub.topic, unsub.msg_id);
            }
            Message::PingReq(_) => {
                self.flush_or_ack_ping(&from);
            }
            Message::Disconnect(d) => {
                self.handle_disconnect(&from, d, now);
            }
            _ => {}
        }
        Ok(())
    }

    fn accept_connection(&mut self, from: &[u8], now: Instant) {
        if let Some(peer) = self.peers.get_mut(from) {
            peer.conn.set_state(ConnState::Connected);
            peer.conn.update_ping(now);
            let client_id = peer.conn.client_id().to_string();
            self.events.push_back(ServerEvent::PeerConnected { address: from.to_vec(), client_id });

            if peer.conn.resume_topics() {
                peer.resume_pending = peer
                    .conn
                    .topics()
                    .iter()
                    .filter(|t| !t.is_wildcard() && !t.is_short())
                    .map(|t| t.id())
                    .collect();
            }
        }
        self.send(from, &Message::ConnAck(ConnAck { return_code: ReturnCode::Accepted }));
    }

    fn handle_register(&mut self, from: &[u8], reg: Register, now: Instant) {
        let Some(peer) = self.peers.get_mut(from) else { return };
        let topic = peer.conn.topics_mut().add_topic(&reg.topic_name, now.elapsed().as_millis() as u64);
        let topic_id = topic.id();
        self.send(from, &Message::RegAck(RegAck { topic_id, msg_id: reg.msg_id, return_code: ReturnCode::Accepted }));
    }

    fn handle_publish(&mut self, from: &[u8], p: Publish) {
        let Some(peer) = self.peers.get_mut(from) else { return };
        let topic_text = resolve_topic_text(peer, p.topic_id_type, p.topic_id);

        let Some(topic_text) = topic_text else {
            if p.qos == Qos::AtLeastOnce || p.qos == Qos::ExactlyOnce {
                self.send(
                    from,
                    &Message::PubAck(PubAck { topic_id: p.topic_id, msg_id: p.msg_id, return_code: ReturnCode::InvalidTopic }),
                );
            }
            return;
        };

        self.broker.publish(&topic_text, &p.data, p.qos, p.retain);

        match p.qos {
            Qos::AtLeastOnce => {
                self.send(from, &Message::PubAck(PubAck { topic_id: p.topic_id, msg_id: p.msg_id, return_code: ReturnCode::Accepted }));
            }
            Qos::ExactlyOnce => {
                self.send(from, &Message::PubRec(PubRec { msg_id: p.msg_id }));
            }
            _ => {}
        }
    }

    fn handle_subscribe(&mut self, from: &[u8], topic: TopicRef, qos: Qos, msg_id: u16, now: Instant) {
        let Some(peer) = self.peers.get_mut(from) else { return };
        let (topic_text, topic_id) = match topic {
            TopicRef::Name(text) => {
                let t = peer.conn.topics_mut().add_topic(&text, now.elapsed().as_millis() as u64);
                let id = if t.is_wildcard() { 0 } else { t.id() };
                (text, id)
            }
            TopicRef::Id(id) => match peer.conn.topics().get_topic_by_id(id) {
                Some(t) => (t.text().to_string(), id),
                None => {
                    self.send(from, &Message::SubAck(SubAck { qos, topic_id: id, msg_id, return_code: ReturnCode::InvalidTopic }));
                    return;
                }
            },
        };

        if let Some(peer) = self.peers.get_mut(from) {
            if let Some(t) = peer.conn.topics_mut().get_topic_by_text_mut(&topic_text) {
                t.set_subscribed(true);
                t.set_qos(qos);
            }
        }

        self.broker.subscribe(&topic_text, qos);
        self.send(from, &Message::SubAck(SubAck { qos, topic_id, msg_id, return_code: ReturnCode::Accepted }));
    }

    fn handle_unsubscribe(&mut self, from: &[u8], topic: TopicRef, msg_id: u16) {
        let Some(peer) = self.peers.get_mut(from) else { return };
        let topic_text = match topic {
            TopicRef::Name(text) => Some(text),
            TopicRef::Id(id) => peer.conn.topics().get_topic_by_id(id).map(|t| t.text().to_string()),
        };
        if let Some(text) = &topic_text {
            if let Some(t) = peer.conn.topics_mut().get_topic_by_text_mut(text) {
                t.set_subscribed(false);
            }
            self.broker.unsubscribe(text);
        }
        self.send(from, &Message::UnsubAck(UnsubAck { msg_id }));
    }

    fn flush_or_ack_ping(&mut self, from: &[u8]) {
        let Some(peer) = self.peers.get_mut(from) else { return };
        if peer.conn.state() == ConnState::Asleep {
            if let Some(frame) = peer.sleep_buffer.pop_front() {
                self.link.send(from, &frame);
                if !peer.sleep_buffer.is_empty() {
                    return; // more buffered frames follow before PINGRESP
                }
            }
            peer.conn.set_state(ConnState::Connected);
        }
        self.send(from, &Message::PingResp(PingResp));
    }

    fn handle_disconnect(&mut self, from: &[u8], d: Disconnect, now: Instant) {
        let Some(peer) = self.peers.get_mut(from) else { return };
        match d.duration {
            Some(secs) => peer.conn.enter_sleep(Duration::from_secs(secs as u64), now),
            None => {
                peer.conn.set_state(ConnState::Disconnected);
                self.events.push_back(ServerEvent::PeerDisconnected { address: from.to_vec() });
            }
        }
        self.send(from, &Message::Disconnect(Disconnect { duration: None }));
    }

    /// Publishes a lost peer's will message (if any) and drops its session.
    fn reap_lost_peer(&mut self, address: &[u8]) {
        if let Some(peer) = self.peers.remove(address) {
            if let Some(topic) = peer.conn.will_topic() {
                self.broker.publish(topic, peer.conn.will_message(), peer.conn.will_qos(), peer.conn.will_retain());
            }
            self.events.push_back(ServerEvent::PeerLost { address: address.to_vec() });
        }
    }

    /// Drains the link inbox, broker events, advertises, retries and
    /// keep-alive/lost-contact checks for every peer.
    pub fn tick(&mut self, now: Instant) {
        for (from, bytes) in self.link.poll_received() {
            if let Ok((msgtype, payload)) = frame::decode_header(&bytes) {
                let _ = self.handle_received(from, msgtype, payload, now);
            }
        }

        if self.last_advertise.map(|t| now.duration_since(t) >= self.advertise_duration / 2).unwrap_or(true) {
            self.last_advertise = Some(now);
            let broadcast = self.link.broadcast_address().to_vec();
            self.send(&broadcast, &Message::Advertise(Advertise { gw_id: self.gw_id, duration: self.advertise_duration.as_secs() as u16 }));
        }

        for event in self.broker.poll_events() {
            if let BrokerEvent::Published { topic, payload, qos, retain } = event {
                self.fan_out(&topic, &payload, qos, retain, now);
            }
        }

        let lost: Vec<Vec<u8>> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.conn.lost_contact(now))
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in lost {
            self.reap_lost_peer(&addr);
        }

        let addrs: Vec<Vec<u8>> = self.peers.keys().cloned().collect();
        for addr in addrs {
            let Some(peer) = self.peers.get_mut(&addr) else { continue };
            let (to_send, _failed) = peer.conn.queue_mut().tick(now);
            for (_, frame) in to_send {
                self.link.send(&addr, &frame);
            }
        }

        for addr in self.peers.keys().cloned().collect::<Vec<_>>() {
            self.drive_resume_register(&addr);
        }
    }

    /// Replays one pending REGISTER for a `clean=0` reconnect's previously
    /// held topics, one at a time, only once the peer has no other activity
    /// in flight.
    fn drive_resume_register(&mut self, addr: &[u8]) {
        let Some(peer) = self.peers.get_mut(addr) else { return };
        if !peer.conn.resume_topics() || peer.resume_pending.is_empty() || peer.conn.queue().get_active().is_some() {
            return;
        }
        let Some(topic_id) = peer.resume_pending.pop_front() else { return };
        let Some(topic_text) = peer.conn.topics().get_topic_by_id(topic_id).map(|t| t.text().to_string()) else { return };

        let reg = Message::Register(Register { topic_id, msg_id: 0, topic_name: topic_text.clone() });
        let Ok(placeholder) = reg.encode_frame(self.link.payload_width()) else { return };
        let Some(mid) = peer.conn.queue_mut().add_message(Activity::RegisteringAll, placeholder, false, topic_id) else { return };
        let reg = Message::Register(Register { topic_id, msg_id: mid, topic_name: topic_text });
        let Ok(frame) = reg.encode_frame(self.link.payload_width()) else { return };
        peer.conn.queue_mut().set_frame(mid, frame.clone());

        if peer.resume_pending.is_empty() {
            peer.conn.set_resume_topics(false);
        }
        self.link.send(addr, &frame);
    }

    fn fan_out(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool, now: Instant) {
        let addrs: Vec<Vec<u8>> = self.peers.keys().cloned().collect();
        for addr in addrs {
            let Some(peer) = self.peers.get_mut(&addr) else { continue };
            let matched = peer
                .conn
                .topics()
                .iter()
                .any(|t| t.is_subscribed() && mqttsn_core::topic::TopicRegistry::matches(t.text(), topic));
            if !matched {
                continue;
            }

            let topic_id = match peer.conn.topics().get_topic_by_text(topic) {
                Some(t) if t.is_complete() => t.id(),
                _ => {
                    let t = peer.conn.topics_mut().add_topic(topic, now.elapsed().as_millis() as u64);
                    let id = t.id();
                    let reg_msg = Message::Register(Register { topic_id: id, msg_id: 0, topic_name: topic.to_string() });
                    if let Ok(frame) = reg_msg.encode_frame(self.link.payload_width()) {
                        if let Some(mid) = peer.conn.queue_mut().add_message(Activity::RegisteringAll, frame.clone(), false, id) {
                            let reg_msg = Message::Register(Register { topic_id: id, msg_id: mid, topic_name: topic.to_string() });
                            if let Ok(frame) = reg_msg.encode_frame(self.link.payload_width()) {
                                peer.conn.queue_mut().set_frame(mid, frame.clone());
                                self.link.send(&addr, &frame);
                            }
                        }
                    }
                    id
                }
            };

            let publish = Message::Publish(Publish {
                dup: false,
                qos,
                retain,
                topic_id_type: TopicIdType::Normal,
                topic_id,
                msg_id: 0,
                data: payload.to_vec(),
            });
            let Ok(frame) = publish.encode_frame(self.link.payload_width()) else { continue };

            if peer.conn.state() == ConnState::Asleep {
                peer.sleep_buffer.push_back(frame);
            } else {
                self.link.send(&addr, &frame);
            }
        }
    }
}
