//! End-to-end client engine scenarios, driven by hand-crafted wire replies
//! instead of a real gateway — mirrors the teacher's `mqtt-client/tests/`
//! style of exercising the async client against a fake transport.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mqttsn_client::{ClientEngine, ClientEvent};
use mqttsn_core::codec::connect::ConnAck;
use mqttsn_core::codec::discovery::GwInfo;
use mqttsn_core::codec::publish::{PubAck, PubComp, PubRec};
use mqttsn_core::codec::register::RegAck;
use mqttsn_core::error::ReturnCode;
use mqttsn_core::queue::{DEFAULT_N_RETRY, DEFAULT_T_RETRY};
use mqttsn_core::topic::TopicIdType;
use mqttsn_core::{ConnState, MsgType, PacketLink, Qos};

struct FakeLink {
    sent: Rc<RefCell<Vec<(Vec<u8>, Vec<u8>)>>>,
}

impl FakeLink {
    fn new() -> (Self, Rc<RefCell<Vec<(Vec<u8>, Vec<u8>)>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        (Self { sent: sent.clone() }, sent)
    }
}

impl PacketLink for FakeLink {
    fn payload_width(&self) -> u8 {
        255
    }

    fn address_len(&self) -> u8 {
        1
    }

    fn broadcast_address(&self) -> &[u8] {
        &[0]
    }

    fn send(&mut self, dest_addr: &[u8], frame: &[u8]) -> bool {
        self.sent.borrow_mut().push((dest_addr.to_vec(), frame.to_vec()));
        true
    }

    fn poll_received(&mut self) -> Vec<(Vec<u8>, Vec<u8>)> {
        Vec::new()
    }

    fn shutdown(&mut self) {}
}

const GW: [u8; 1] = [9];

fn connected_engine() -> (ClientEngine<FakeLink>, Instant) {
    let (link, _sent) = FakeLink::new();
    let mut engine = ClientEngine::new(link, "sensor-1".to_string(), Duration::from_secs(60));
    let now = Instant::now();
    engine.connect(GW.to_vec(), true);
    let connack = ConnAck { return_code: ReturnCode::Accepted };
    engine.handle_received(GW.to_vec(), MsgType::ConnAck as u8, &connack.encode(), now).unwrap();
    engine.events().for_each(drop);
    (engine, now)
}

#[test]
fn s1_discovery_then_clean_connect() {
    let (link, _sent) = FakeLink::new();
    let mut engine = ClientEngine::new(link, "sensor-1".to_string(), Duration::from_secs(60));
    let now = Instant::now();

    engine.search_gateways(1);
    let gwinfo = GwInfo { gw_id: 7, gw_add: GW.to_vec() };
    engine.handle_received(GW.to_vec(), MsgType::GwInfo as u8, &gwinfo.encode(), now).unwrap();

    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::GatewayDiscovered { gw_id: 7, address: GW.to_vec() }]);

    engine.connect(GW.to_vec(), true);
    let connack = ConnAck { return_code: ReturnCode::Accepted };
    engine.handle_received(GW.to_vec(), MsgType::ConnAck as u8, &connack.encode(), now).unwrap();

    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::Connected]);
    assert_eq!(engine.connection().state(), ConnState::Connected);
}

#[test]
fn s3_register_then_qos1_publish() {
    let (mut engine, now) = connected_engine();

    let mid = engine.register("sensors/t", now).unwrap();
    let regack = RegAck { topic_id: 1, msg_id: mid, return_code: ReturnCode::Accepted };
    engine.handle_received(GW.to_vec(), MsgType::RegAck as u8, &regack.encode(), now).unwrap();
    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::Registered { msg_id: mid, topic_id: 1 }]);

    let pub_mid = engine.publish(TopicIdType::Normal, 1, Qos::AtLeastOnce, false, b"23.5".to_vec()).unwrap();
    let puback = PubAck { topic_id: 1, msg_id: pub_mid, return_code: ReturnCode::Accepted };
    engine.handle_received(GW.to_vec(), MsgType::PubAck as u8, &puback.encode(), now).unwrap();
    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::Published { msg_id: pub_mid }]);
}

#[test]
fn s4_qos2_round_trip_fires_published_once() {
    let (mut engine, now) = connected_engine();

    let mid = engine.publish(TopicIdType::Normal, 1, Qos::ExactlyOnce, false, b"42".to_vec()).unwrap();

    let pubrec = PubRec { msg_id: mid };
    engine.handle_received(GW.to_vec(), MsgType::PubRec as u8, &pubrec.encode(), now).unwrap();
    assert!(engine.events().next().is_none(), "PUBREC alone fires no client-visible event");

    let pubcomp = PubComp { msg_id: mid };
    engine.handle_received(GW.to_vec(), MsgType::PubComp as u8, &pubcomp.encode(), now).unwrap();
    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::Published { msg_id: mid }]);

    assert!(engine.connection().queue().get_by_id(mid).is_none());
}

#[test]
fn gateway_filter_drops_publish_from_an_unbound_address() {
    let (mut engine, now) = connected_engine();

    let imposter = vec![42u8];
    let publish = mqttsn_core::codec::publish::Publish {
        dup: false,
        qos: Qos::AtMostOnce,
        retain: false,
        topic_id_type: TopicIdType::Normal,
        topic_id: 1,
        msg_id: 0,
        data: b"not from my gateway".to_vec(),
    };
    engine.handle_received(imposter, MsgType::Publish as u8, &publish.encode(), now).unwrap();
    assert!(engine.events().next().is_none(), "PUBLISH from an address other than the bound gateway must be dropped");

    let publish = mqttsn_core::codec::publish::Publish {
        dup: false,
        qos: Qos::AtMostOnce,
        retain: false,
        topic_id_type: TopicIdType::Normal,
        topic_id: 1,
        msg_id: 0,
        data: b"from my gateway".to_vec(),
    };
    engine.handle_received(GW.to_vec(), MsgType::Publish as u8, &publish.encode(), now).unwrap();
    assert!(engine.events().next().is_some(), "PUBLISH from the bound gateway must be delivered");
}

#[test]
fn qos0_publish_is_sent_once_with_no_retry_and_no_failure_event() {
    let (mut engine, now) = connected_engine();
    let mid = engine.publish(TopicIdType::Normal, 1, Qos::AtMostOnce, false, b"23.5".to_vec()).unwrap();

    let mut t = now;
    for _ in 0..(DEFAULT_N_RETRY as u32 + 3) {
        t += DEFAULT_T_RETRY;
        engine.tick(t);
    }
    assert!(engine.connection().queue().get_by_id(mid).is_none(), "QoS 0 must be freed after its single send, not retried");
    assert!(engine.events().next().is_none(), "QoS 0 publish has no confirmation, so it must never surface a failure");
}

#[test]
fn qos2_pubrec_recycles_the_slot_to_retransmit_pubrel_not_the_stale_publish() {
    let (mut engine, now) = connected_engine();
    let mid = engine.publish(TopicIdType::Normal, 1, Qos::ExactlyOnce, false, b"42".to_vec()).unwrap();

    let pubrec = PubRec { msg_id: mid };
    engine.handle_received(GW.to_vec(), MsgType::PubRec as u8, &pubrec.encode(), now).unwrap();
    engine.events().for_each(drop);

    // Lose the PUBCOMP: the next retry must resend PUBREL, not the original
    // PUBLISH, and must not count against whatever attempts PUBLISH already made.
    let t = now + DEFAULT_T_RETRY;
    engine.tick(t);

    let sent = engine.connection().queue().get_by_id(mid);
    assert!(sent.is_some(), "slot must still be live, retrying PUBREL");
    assert_eq!(sent.unwrap().attempts(), 1, "retry budget must reset when the slot is recycled");
}

#[test]
fn register_non_accepted_regack_deletes_the_pending_topic() {
    let (mut engine, now) = connected_engine();
    let mid = engine.register("sensors/t", now).unwrap();

    let regack = RegAck { topic_id: 0, msg_id: mid, return_code: ReturnCode::InvalidTopic };
    engine.handle_received(GW.to_vec(), MsgType::RegAck as u8, &regack.encode(), now).unwrap();
    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::RegisterFailed { msg_id: mid }]);

    assert!(
        engine.connection().topics().get_topic_by_text("sensors/t").is_none(),
        "a rejected REGACK must delete the pending topic, not leave it incomplete in the registry"
    );
}

#[test]
fn connect_retries_connect_and_reports_timeout_on_exhaustion() {
    let (link, sent) = FakeLink::new();
    let mut engine = ClientEngine::new(link, "sensor-1".to_string(), Duration::from_secs(60));
    let now = Instant::now();
    engine.connect(GW.to_vec(), true);
    assert_eq!(engine.connection().state(), ConnState::Connecting);

    let mut t = now;
    for _ in 0..(DEFAULT_N_RETRY as u32 + 3) {
        t += DEFAULT_T_RETRY;
        engine.tick(t);
    }

    let events: Vec<_> = engine.events().collect();
    assert_eq!(events, vec![ClientEvent::ConnectTimedOut]);
    assert_eq!(engine.connection().state(), ConnState::Disconnected);

    let connect_frames = sent.borrow().iter().filter(|(_, f)| f[1] == MsgType::Connect as u8).count();
    assert!(connect_frames > 1, "an unanswered CONNECT must be retried, not sent only once");
}

#[test]
fn s5_publish_fails_after_retry_budget_is_exhausted() {
    let (mut engine, now) = connected_engine();
    let mid = engine.publish(TopicIdType::Normal, 1, Qos::AtLeastOnce, false, b"x".to_vec()).unwrap();

    let mut failed_events = Vec::new();
    let mut t = now;
    for _ in 0..(DEFAULT_N_RETRY as u32 + 3) {
        t += DEFAULT_T_RETRY;
        engine.tick(t);
        failed_events.extend(engine.events());
    }

    assert_eq!(failed_events, vec![ClientEvent::PublishFailed { msg_id: mid }]);
    assert!(engine.connection().queue().get_by_id(mid).is_none());
}
