use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use mqttsn_gateway::config::{GatewayConfig, DEFAULT_CONFIG_TOML};
use mqttsn_gateway::{GatewayLogger, RumqttcBridge, ServerEngine, UdpLink};

#[derive(Parser)]
#[command(name = "mqttsn-gatewayd", about = "MQTT-SN to MQTT transparent gateway daemon")]
struct Cli {
    #[arg(long, default_value = "gateway.toml")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli.config);

    if config.should_log_console() || config.should_log_file() {
        let _ = GatewayLogger::new(&config).init();
    }

    let link = UdpLink::bind(&config.bind_addr()).expect("failed to bind UDP socket");
    let (host, port) = config.broker_addr();
    let broker = RumqttcBridge::connect(host, port, config.broker_client_id());

    log::info!("gateway {} listening on {}", config.gw_id(), config.bind_addr());

    let mut engine = ServerEngine::new(
        link,
        broker,
        config.gw_id(),
        Duration::from_secs(config.advertise_duration_secs() as u64),
        config.max_connections(),
    );

    loop {
        engine.tick(Instant::now());
        for event in engine.events().collect::<Vec<_>>() {
            log::info!("{event:?}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn load_config(path: &Path) -> GatewayConfig {
    if !path.exists() {
        std::fs::write(path, DEFAULT_CONFIG_TOML).expect("failed to write default config");
    }
    GatewayConfig::try_from(path).expect("invalid config file")
}
