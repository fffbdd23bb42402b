//! The client-side state machine: discovery, connect/will handshake,
//! register, publish, subscribe, ping and sleep, all driven by
//! [`ClientEngine::handle_received`] and [`ClientEngine::tick`].
//!
//! Grounded on the teacher's `mqtt-client/src/async/mod.rs` (`AsyncClient<T>`
//! wrapping a single stream and exposing one request at a time), reworked
//! here around MQTT-SN's id-based retry queue instead of a raw byte stream.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use mqttsn_core::codec::connect::Connect;
use mqttsn_core::codec::discovery::SearchGw;
use mqttsn_core::codec::publish::{pack_short_topic, Publish};
use mqttsn_core::codec::register::Register;
use mqttsn_core::codec::session::{Disconnect, PingReq};
use mqttsn_core::codec::subscribe::{Subscribe, TopicRef, Unsubscribe};
use mqttsn_core::codec::will::{WillMsg, WillTopic};
use mqttsn_core::connection::ConnState;
use mqttsn_core::error::{EngineErrorKind, ReturnCode, MSG_FAILURE};
use mqttsn_core::frame;
use mqttsn_core::gateway_table::GatewayTable;
use mqttsn_core::queue::Activity;
use mqttsn_core::topic::TopicIdType;
use mqttsn_core::{Connection, Message, PacketLink, Qos};

use crate::error::ClientError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    GatewayDiscovered { gw_id: u8, address: Vec<u8> },
    Connected,
    ConnectFailed(ReturnCode),
    Registered { msg_id: u16, topic_id: u16 },
    RegisterFailed { msg_id: u16 },
    Published { msg_id: u16 },
    PublishFailed { msg_id: u16 },
    ConnectTimedOut,
    Subscribed { msg_id: u16, topic_id: u16, qos: Qos },
    SubscribeFailed { msg_id: u16 },
    Unsubscribed { msg_id: u16 },
    Message { topic_id_type: TopicIdType, topic_id: u16, qos: Qos, retain: bool, data: Vec<u8> },
    WillTopicRequested,
    WillMessageRequested,
    Disconnected,
    LostContact,
}

pub struct ClientEngine<L: PacketLink> {
    link: L,
    conn: Connection,
    gateways: GatewayTable,
    gw_address: Option<Vec<u8>>,
    events: VecDeque<ClientEvent>,
}

impl<L: PacketLink> ClientEngine<L> {
    pub fn new(link: L, client_id: String, keep_alive: Duration) -> Self {
        Self {
            link,
            conn: Connection::new(Vec::new(), client_id, keep_alive),
            gateways: GatewayTable::default(),
            gw_address: None,
            events: VecDeque::new(),
        }
    }

    pub fn events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.events.drain(..)
    }

    pub fn add_permanent_gateway(&mut self, address: Vec<u8>, gw_id: u8) {
        self.gateways.add_permanent(address, gw_id);
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn send(&mut self, dest: &[u8], msg: &Message) -> bool {
        match msg.encode_frame(self.link.payload_width()) {
            Ok(frame) => self.link.send(dest, &frame),
            Err(_) => false,
        }
    }

    /// Broadcasts SEARCHGW; queued as a one-shot activity so `tick` will
    /// surface a failure event if nothing answers within the retry law.
    pub fn search_gateways(&mut self, radius: u8) {
        let msg = Message::SearchGw(SearchGw { radius });
        let broadcast = self.link.broadcast_address().to_vec();
        let frame = msg.encode_frame(self.link.payload_width()).unwrap_or_default();
        self.conn.queue_mut().add_message(Activity::Searching, frame.clone(), true, 0);
        self.link.send(&broadcast, &frame);
    }

    /// Stores will fields ahead of `connect` so the engine can answer
    /// WILLTOPICREQ/WILLMSGREQ without the caller re-entering the handshake.
    pub fn set_will(&mut self, topic: String, qos: Qos, retain: bool, message: Vec<u8>) -> Result<(), ClientError> {
        self.conn.set_will_topic(topic, qos, retain).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        self.conn.set_will_message(message).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        Ok(())
    }

    pub fn connect(&mut self, gw_address: Vec<u8>, clean_session: bool) {
        self.gw_address = Some(gw_address.clone());
        self.conn.set_clean_session(clean_session);
        self.conn.set_state(ConnState::Connecting);
        let msg = Message::Connect(Connect {
            will: self.conn.will_topic().is_some(),
            clean_session,
            duration: self.conn.keep_alive().as_secs() as u16,
            client_id: self.conn.client_id().to_string(),
        });
        if let Ok(frame) = msg.encode_frame(self.link.payload_width()) {
            self.conn.queue_mut().add_message(Activity::Connecting, frame, false, 0);
        }
        self.send(&gw_address, &msg);
    }

    pub fn register(&mut self, topic_text: &str, now: Instant) -> Result<u16, ClientError> {
        if self.conn.state() != ConnState::Connected {
            return Err(ClientError::NotConnected);
        }
        let gw = self.gw_address.clone().ok_or(ClientError::NoGateway)?;
        let placeholder = Message::Register(Register { topic_id: 0, msg_id: 0, topic_name: topic_text.to_string() });
        let placeholder_frame = placeholder.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        let mid = self
            .conn
            .queue_mut()
            .add_message(Activity::Registering, placeholder_frame, false, 0)
            .ok_or(EngineErrorKind::QueueFull)?;

        self.conn.topics_mut().reg_topic(topic_text, mid, now.elapsed().as_millis() as u64);
        let msg = Message::Register(Register { topic_id: 0, msg_id: mid, topic_name: topic_text.to_string() });
        let frame = msg.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        self.conn.queue_mut().set_frame(mid, frame);
        self.send(&gw, &msg);
        Ok(mid)
    }

    pub fn publish(
        &mut self,
        topic_id_type: TopicIdType,
        topic_id: u16,
        qos: Qos,
        retain: bool,
        data: Vec<u8>,
    ) -> Result<u16, ClientError> {
        let gw = self.gw_address.clone().ok_or(ClientError::NoGateway)?;
        if qos != Qos::NegOne && self.conn.state() != ConnState::Connected {
            return Err(ClientError::NotConnected);
        }

        if qos == Qos::NegOne {
            let msg = Message::Publish(Publish { dup: false, qos, retain, topic_id_type, topic_id, msg_id: 0, data });
            self.send(&gw, &msg);
            return Ok(0);
        }

        let one_shot = qos == Qos::AtMostOnce;
        let placeholder = Message::Publish(Publish { dup: false, qos, retain, topic_id_type, topic_id, msg_id: 0, data: data.clone() });
        let placeholder_frame = placeholder.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        let mid = self
            .conn
            .queue_mut()
            .add_message(Activity::Publishing, placeholder_frame, one_shot, topic_id)
            .ok_or(EngineErrorKind::QueueFull)?;

        let msg = Message::Publish(Publish { dup: false, qos, retain, topic_id_type, topic_id, msg_id: mid, data });
        let frame = msg.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        self.conn.queue_mut().set_frame(mid, frame);
        self.send(&gw, &msg);
        Ok(mid)
    }

    /// Convenience for the common case of publishing straight to a 2-byte
    /// short topic name without registering it first.
    pub fn publish_short(&mut self, short_name: &str, qos: Qos, retain: bool, data: Vec<u8>) -> Result<u16, ClientError> {
        let id = pack_short_topic(short_name).ok_or(EngineErrorKind::UnknownTopic)?;
        self.publish(TopicIdType::Short, id, qos, retain, data)
    }

    pub fn subscribe(&mut self, topic: TopicRef, qos: Qos) -> Result<u16, ClientError> {
        if self.conn.state() != ConnState::Connected {
            return Err(ClientError::NotConnected);
        }
        let gw = self.gw_address.clone().ok_or(ClientError::NoGateway)?;
        let placeholder = Message::Subscribe(Subscribe { dup: false, qos, msg_id: 0, topic: topic.clone() });
        let placeholder_frame = placeholder.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        let mid = self
            .conn
            .queue_mut()
            .add_message(Activity::Subscribing, placeholder_frame, false, 0)
            .ok_or(EngineErrorKind::QueueFull)?;

        let msg = Message::Subscribe(Subscribe { dup: false, qos, msg_id: mid, topic });
        let frame = msg.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        self.conn.queue_mut().set_frame(mid, frame);
        self.send(&gw, &msg);
        Ok(mid)
    }

    pub fn unsubscribe(&mut self, topic: TopicRef, qos: Qos) -> Result<u16, ClientError> {
        if self.conn.state() != ConnState::Connected {
            return Err(ClientError::NotConnected);
        }
        let gw = self.gw_address.clone().ok_or(ClientError::NoGateway)?;
        let placeholder = Message::Unsubscribe(Unsubscribe { dup: false, qos, msg_id: 0, topic: topic.clone() });
        let placeholder_frame = placeholder.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        let mid = self
            .conn
            .queue_mut()
            .add_message(Activity::Unsubscribing, placeholder_frame, false, 0)
            .ok_or(EngineErrorKind::QueueFull)?;

        let msg = Message::Unsubscribe(Unsubscribe { dup: false, qos, msg_id: mid, topic });
        let frame = msg.encode_frame(self.link.payload_width()).map_err(|_| EngineErrorKind::PayloadTooLarge)?;
        self.conn.queue_mut().set_frame(mid, frame);
        self.send(&gw, &msg);
        Ok(mid)
    }

    pub fn ping(&mut self, now: Instant) -> Result<(), ClientError> {
        let gw = self.gw_address.clone().ok_or(ClientError::NoGateway)?;
        self.conn.update_ping(now);
        self.send(&gw, &Message::PingReq(PingReq { client_id: None }));
        Ok(())
    }

    pub fn disconnect(&mut self, sleep_duration: Option<Duration>) -> Result<(), ClientError> {
        let gw = self.gw_address.clone().ok_or(ClientError::NoGateway)?;
        let secs = sleep_duration.map(|d| d.as_secs() as u16);
        self.send(&gw, &Message::Disconnect(Disconnect { duration: secs }));
        match sleep_duration {
            Some(d) => self.conn.enter_sleep(d, Instant::now()),
            None => self.conn.set_state(ConnState::Disconnected),
        }
        Ok(())
    }

    /// Feeds one received frame through the state machine. Discovery replies
    /// (GWINFO, ADVERTISE) are accepted from any address; everything else is
    /// dropped unless it comes from the currently bound gateway.
    pub fn handle_received(&mut self, from: Vec<u8>, msgtype: u8, payload: &[u8], now: Instant) -> Result<(), ClientError> {
        let msg = Message::decode(msgtype, payload)?;

        let is_discovery = matches!(msg, Message::GwInfo(_) | Message::Advertise(_));
        if !is_discovery && self.gw_address.as_deref() != Some(from.as_slice()) {
            return Ok(());
        }
        self.conn.update_activity(now);

        match msg {
            Message::GwInfo(info) => {
                self.gateways.observe(from, info.gw_id, Duration::from_secs(300), now);
                self.events.push_back(ClientEvent::GatewayDiscovered { gw_id: info.gw_id, address: info.gw_add });
            }
            Message::Advertise(adv) => {
                self.gateways.observe(from, adv.gw_id, Duration::from_secs(adv.duration as u64), now);
            }
            Message::WillTopicReq(_) => {
                self.events.push_back(ClientEvent::WillTopicRequested);
                let topic = self.conn.will_topic().unwrap_or("").to_string();
                let qos = self.conn.will_qos();
                let retain = self.conn.will_retain();
                self.send(&from, &Message::WillTopic(WillTopic { qos, retain, topic }));
            }
            Message::WillMsgReq(_) => {
                self.events.push_back(ClientEvent::WillMessageRequested);
                let message = self.conn.will_message().to_vec();
                self.send(&from, &Message::WillMsg(WillMsg { message }));
            }
            Message::ConnAck(ack) => {
                self.conn.queue_mut().complete_activity(Activity::Connecting);
                if ack.return_code == ReturnCode::Accepted {
                    self.conn.set_state(ConnState::Connected);
                    self.conn.update_ping(now);
                    self.events.push_back(ClientEvent::Connected);
                } else {
                    self.conn.set_state(ConnState::Disconnected);
                    self.events.push_back(ClientEvent::ConnectFailed(ack.return_code));
                }
            }
            Message::RegAck(ack) => {
                self.conn.queue_mut().complete(ack.msg_id);
                if ack.return_code == ReturnCode::Accepted {
                    self.conn.topics_mut().complete_topic(ack.msg_id, ack.topic_id);
                    self.events.push_back(ClientEvent::Registered { msg_id: ack.msg_id, topic_id: ack.topic_id });
                } else {
                    self.conn.topics_mut().del_topic_by_mid(ack.msg_id);
                    self.events.push_back(ClientEvent::RegisterFailed { msg_id: ack.msg_id });
                }
            }
            Message::Register(reg) => {
                // Gateway-initiated REGISTER for a predefined topic it wants named.
                self.conn.topics_mut().create_topic(&reg.topic_name, reg.topic_id, false, now.elapsed().as_millis() as u64).ok();
                self.send(
                    &from,
                    &Message::RegAck(mqttsn_core::codec::register::RegAck {
                        topic_id: reg.topic_id,
                        msg_id: reg.msg_id,
                        return_code: ReturnCode::Accepted,
                    }),
                );
            }
            Message::PubAck(ack) => {
                self.conn.queue_mut().complete(ack.msg_id);
                if ack.return_code == ReturnCode::Accepted {
                    self.events.push_back(ClientEvent::Published { msg_id: ack.msg_id });
                } else {
                    self.events.push_back(ClientEvent::PublishFailed { msg_id: ack.msg_id });
                }
            }
            Message::PubRec(rec) => {
                let pubrel = Message::PubRel(mqttsn_core::codec::publish::PubRel { msg_id: rec.msg_id });
                if let Ok(frame) = pubrel.encode_frame(self.link.payload_width()) {
                    // Recycle the PUBLISH slot to carry PUBREL so a lost
                    // PUBCOMP retransmits PUBREL (not the stale PUBLISH) with
                    // a fresh retry budget.
                    self.conn.queue_mut().recycle(rec.msg_id, Activity::Publishing, frame);
                }
                self.send(&from, &pubrel);
            }
            Message::PubComp(comp) => {
                self.conn.queue_mut().complete(comp.msg_id);
                self.events.push_back(ClientEvent::Published { msg_id: comp.msg_id });
            }
            Message::Publish(p) => {
                self.events.push_back(ClientEvent::Message {
                    topic_id_type: p.topic_id_type,
                    topic_id: p.topic_id,
                    qos: p.qos,
                    retain: p.retain,
                    data: p.data.clone(),
                });
                match p.qos {
                    Qos::AtLeastOnce => {
                        self.send(
                            &from,
                            &Message::PubAck(mqttsn_core::codec::publish::PubAck {
                                topic_id: p.topic_id,
                                msg_id: p.msg_id,
                                return_code: ReturnCode::Accepted,
                            }),
                        );
                    }
                    Qos::ExactlyOnce => {
                        self.send(&from, &Message::PubRec(mqttsn_core::codec::publish::PubRec { msg_id: p.msg_id }));
                    }
                    _ => {}
                }
            }
            Message::PubRel(rel) => {
                self.send(&from, &Message::PubComp(mqttsn_core::codec::publish::PubComp { msg_id: rel.msg_id }));
            }
            Message::SubAck(ack) => {
                self.conn.queue_mut().complete(ack.msg_id);
                if ack.return_code == ReturnCode::Accepted {
                    self.events.push_back(ClientEvent::Subscribed { msg_id: ack.msg_id, topic_id: ack.topic_id, qos: ack.qos });
                } else {
                    self.events.push_back(ClientEvent::SubscribeFailed { msg_id: ack.msg_id });
                }
            }
            Message::UnsubAck(ack) => {
                self.conn.queue_mut().complete(ack.msg_id);
                self.events.push_back(ClientEvent::Unsubscribed { msg_id: ack.msg_id });
            }
            Message::PingResp(_) => {}
            Message::Disconnect(_) => {
                self.conn.set_state(ConnState::Disconnected);
                self.events.push_back(ClientEvent::Disconnected);
            }
            _ => {}
        }
        Ok(())
    }

    /// Drains the link's inbox, drives retries, and checks keep-alive.
    pub fn tick(&mut self, now: Instant) {
        for (from, bytes) in self.link.poll_received() {
            if let Ok((msgtype, payload)) = frame::decode_header(&bytes) {
                let _ = self.handle_received(from, msgtype, payload, now);
            }
        }

        if self.conn.state() == ConnState::Connected && self.conn.send_another_ping(now) {
            let _ = self.ping(now);
        }
        if self.conn.lost_contact(now) {
            self.conn.set_state(ConnState::Disconnected);
            self.events.push_back(ClientEvent::LostContact);
        }

        let gw = self.gw_address.clone();
        let (to_send, failed) = self.conn.queue_mut().tick(now);
        if let Some(gw) = gw {
            for (_, frame) in to_send {
                self.link.send(&gw, &frame);
            }
        }
        for (mid, activity) in failed {
            let _ = MSG_FAILURE;
            match activity {
                Activity::Connecting => {
                    self.conn.set_state(ConnState::Disconnected);
                    self.events.push_back(ClientEvent::ConnectTimedOut);
                }
                Activity::Publishing => self.events.push_back(ClientEvent::PublishFailed { msg_id: mid }),
                Activity::Subscribing => self.events.push_back(ClientEvent::SubscribeFailed { msg_id: mid }),
                Activity::Registering => self.events.push_back(ClientEvent::RegisterFailed { msg_id: mid }),
                Activity::Searching => {}
                _ => {}
            }
        }

        self.gateways.prune_inactive(now);
    }
}
