//! TOML-backed gateway configuration, grounded on the teacher's
//! `mqtt-broker/src/config.rs` (`MqttConfig`/`TryFrom<&Path>` pattern).

use std::fs::File;
use std::io::Read;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct GatewayConfig {
    link: Link,
    broker: Broker,
    gateway: Gateway,
    logger: Logger,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.link.ip, self.link.port)
    }

    pub fn broker_addr(&self) -> (&str, u16) {
        (&self.broker.host, self.broker.port)
    }

    pub fn broker_client_id(&self) -> &str {
        &self.broker.client_id
    }

    pub fn gw_id(&self) -> u8 {
        self.gateway.id
    }

    pub fn advertise_duration_secs(&self) -> u16 {
        self.gateway.advertise_duration_secs
    }

    pub fn max_connections(&self) -> usize {
        self.gateway.max_connections
    }

    pub fn should_log_console(&self) -> bool {
        self.logger.console
    }

    pub fn should_log_file(&self) -> bool {
        self.logger.file
    }

    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.logger.level)
            .unwrap_or_else(|_| panic!("invalid log level: {}", self.logger.level))
    }
}

impl TryFrom<&Path> for GatewayConfig {
    type Error = toml::de::Error;

    fn try_from(path: &Path) -> Result<Self, toml::de::Error> {
        let mut file = File::open(path).unwrap_or_else(|err| {
            log::error!("could not open config file {}: {err}", path.display());
            panic!("missing config file");
        });

        let mut buf = String::new();
        if let Err(err) = file.read_to_string(&mut buf) {
            log::error!("could not read config file {}: {err}", path.display());
        }

        toml::from_str(&buf)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            link: Link { ip: Ipv4Addr::new(0, 0, 0, 0), port: 10000 },
            broker: Broker { host: "127.0.0.1".to_string(), port: 1883, client_id: "mqttsn-gateway".to_string() },
            gateway: Gateway { id: 1, advertise_duration_secs: 900, max_connections: 32 },
            logger: Logger { console: true, file: false, level: "info".to_string() },
        }
    }
}

#[derive(Deserialize)]
struct Link {
    ip: Ipv4Addr,
    port: u16,
}

#[derive(Deserialize)]
struct Broker {
    host: String,
    port: u16,
    client_id: String,
}

#[derive(Deserialize)]
struct Gateway {
    id: u8,
    advertise_duration_secs: u16,
    max_connections: usize,
}

#[derive(Deserialize)]
struct Logger {
    console: bool,
    file: bool,
    level: String,
}

pub const DEFAULT_CONFIG_TOML: &str = r#"[link]
ip = "0.0.0.0"
port = 10000

[broker]
host = "127.0.0.1"
port = 1883
client_id = "mqttsn-gateway"

[gateway]
id = 1
advertise_duration_secs = 900
max_connections = 32

[logger]
console = true
file = false
level = "info"
"#;
