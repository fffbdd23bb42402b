use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use colored::*;
use mqttsn_client::udp_link::encode_addr;
use mqttsn_client::{ClientEngine, ClientEvent, UdpLink};
use mqttsn_core::codec::subscribe::TopicRef;
use mqttsn_core::topic::TopicIdType;
use mqttsn_core::Qos;

#[derive(Parser)]
#[command(name = "mqttsn-client-cli", about = "Interactive MQTT-SN client over UDP")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:0")]
    bind: String,
    #[arg(long, default_value = "127.0.0.1:10000")]
    gateway: SocketAddrV4,
    #[arg(long, default_value = "mqttsn-cli")]
    client_id: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Publish {
        topic: String,
        message: String,
        #[arg(long, default_value_t = 1)]
        qos: i8,
    },
    Subscribe {
        topic: String,
        #[arg(long, default_value_t = 1)]
        qos: i8,
    },
}

fn parse_qos(value: i8) -> Qos {
    match value {
        0 => Qos::AtMostOnce,
        2 => Qos::ExactlyOnce,
        -1 => Qos::NegOne,
        _ => Qos::AtLeastOnce,
    }
}

fn main() {
    env_logger_init();
    let cli = Cli::parse();

    let broadcast = SocketAddrV4::new(Ipv4Addr::new(255, 255, 255, 255), cli.gateway.port());
    let link = UdpLink::bind(&cli.bind, broadcast).expect("failed to bind UDP socket");
    log::info!("{}", format!("bound to {}", link.local_addr().unwrap()).cyan());

    let mut engine = ClientEngine::new(link, cli.client_id, Duration::from_secs(60));
    let gw_addr = encode_addr(cli.gateway);
    engine.connect(gw_addr, true);

    let start = Instant::now();
    loop {
        engine.tick(Instant::now());
        for event in engine.events().collect::<Vec<_>>() {
            handle_event(&mut engine, &cli.command, event);
        }
        std::thread::sleep(Duration::from_millis(50));
        if start.elapsed() > Duration::from_secs(30) && engine.connection().state() != mqttsn_core::ConnState::Connected {
            log::error!("{}", "gave up waiting for CONNACK".red());
            break;
        }
    }
}

fn handle_event(engine: &mut ClientEngine<UdpLink>, command: &Command, event: ClientEvent) {
    match event {
        ClientEvent::Connected => {
            log::info!("{}", "connected".green());
            match command {
                Command::Publish { topic, message, qos } => {
                    let qos = parse_qos(*qos);
                    if qos == Qos::NegOne {
                        let _ = engine.publish(TopicIdType::Short, 0, qos, false, message.clone().into_bytes());
                    } else if let Ok(mid) = engine.register(topic, Instant::now()) {
                        log::info!("registering topic, msg_id={mid}");
                    }
                }
                Command::Subscribe { topic, qos } => {
                    let _ = engine.subscribe(TopicRef::Name(topic.clone()), parse_qos(*qos));
                }
            }
        }
        ClientEvent::Registered { topic_id, .. } => {
            if let Command::Publish { message, qos, .. } = command {
                let _ = engine.publish(TopicIdType::Normal, topic_id, parse_qos(*qos), false, message.clone().into_bytes());
            }
        }
        ClientEvent::Published { msg_id } => log::info!("{}", format!("publish {msg_id} acked").green()),
        ClientEvent::PublishFailed { msg_id } => log::warn!("{}", format!("publish {msg_id} failed").yellow()),
        ClientEvent::Subscribed { topic_id, .. } => log::info!("{}", format!("subscribed, topic_id={topic_id}").green()),
        ClientEvent::Message { data, .. } => {
            log::info!("{}", format!("message: {}", String::from_utf8_lossy(&data)).cyan());
        }
        ClientEvent::LostContact => log::error!("{}", "lost contact with gateway".red()),
        _ => {}
    }
}

fn env_logger_init() {
    let _ = log::set_boxed_logger(Box::new(SimpleLogger)).map(|_| log::set_max_level(log::LevelFilter::Info));
}

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
