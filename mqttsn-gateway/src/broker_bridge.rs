//! `rumqttc`-backed [`BrokerBridge`]: the gateway is an MQTT *client* to the
//! real broker it bridges to, so this crate reaches for an MQTT client
//! library rather than reimplementing MQTT — the one piece of the stack with
//! no counterpart in the teacher, justified in `DESIGN.md`.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use mqttsn_core::{BrokerBridge, BrokerEvent, Qos};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};

pub struct RumqttcBridge {
    client: Client,
    events_rx: Receiver<BrokerEvent>,
}

fn to_rumqttc_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce | Qos::NegOne => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn from_rumqttc_qos(qos: QoS) -> Qos {
    match qos {
        QoS::AtMostOnce => Qos::AtMostOnce,
        QoS::AtLeastOnce => Qos::AtLeastOnce,
        QoS::ExactlyOnce => Qos::ExactlyOnce,
    }
}

impl RumqttcBridge {
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(opts, 64);
        let (tx, events_rx) = mpsc::channel();

        std::thread::spawn(move || {
            for notification in connection.iter() {
                let event = match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => Some(BrokerEvent::Connected),
                    Ok(Event::Incoming(Packet::Disconnect)) => Some(BrokerEvent::Disconnected),
                    Ok(Event::Incoming(Packet::Publish(p))) => Some(BrokerEvent::Published {
                        topic: p.topic,
                        payload: p.payload.to_vec(),
                        qos: from_rumqttc_qos(p.qos),
                        retain: p.retain,
                    }),
                    Ok(Event::Incoming(Packet::PubAck(ack))) => Some(BrokerEvent::PublishAcked { local_id: ack.pkid }),
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        let granted = ack
                            .return_codes
                            .first()
                            .and_then(|rc| match rc {
                                rumqttc::SubscribeReasonCode::Success(q) => Some(from_rumqttc_qos(*q)),
                                _ => None,
                            })
                            .unwrap_or(Qos::AtMostOnce);
                        Some(BrokerEvent::SubscribeAcked { local_id: ack.pkid, granted_qos: granted })
                    }
                    Ok(Event::Incoming(Packet::UnsubAck(ack))) => Some(BrokerEvent::UnsubscribeAcked { local_id: ack.pkid }),
                    Ok(_) => None,
                    Err(_) => break,
                };
                if let Some(event) = event {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Self { client, events_rx }
    }
}

impl BrokerBridge for RumqttcBridge {
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> bool {
        self.client.publish(topic, to_rumqttc_qos(qos), retain, payload).is_ok()
    }

    fn subscribe(&mut self, topic_filter: &str, qos: Qos) -> bool {
        self.client.subscribe(topic_filter, to_rumqttc_qos(qos)).is_ok()
    }

    fn unsubscribe(&mut self, topic_filter: &str) -> bool {
        self.client.unsubscribe(topic_filter).is_ok()
    }

    fn poll_events(&mut self) -> Vec<BrokerEvent> {
        self.events_rx.try_iter().collect()
    }
}
