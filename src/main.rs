use std::fs::File;
use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use btleplug::api::{Central as _, Manager as _, ScanFilter};
use btleplug::platform::Manager;
use clap::Parser;
use log::info;

mod config;
mod detector;
mod messages;
mod monitor;
mod mqtt;
mod registry;
mod sampler;
mod supervisor;

#[derive(Parser, Debug)]
#[command(version, about = "Bluetooth RSSI presence monitor")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut file = File::open(&args.config)
        .with_context(|| format!("opening {}", args.config.display()))?;
    let mut config_contents = String::new();
    file.read_to_string(&mut config_contents)?;

    let config: config::AppConfig = toml::de::from_str(&config_contents)?;
    config.validate()?;
    info!("devices: {:?}", config.devices);

    let location = config
        .mqtt
        .location
        .clone()
        .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());

    let (mqtt_client, eventloop) = mqtt::MqttClient::new(&config.mqtt, &location);
    info!("publishing presence to {}", mqtt_client.topic());
    tokio::spawn(mqtt::MqttClient::drive(eventloop));

    let bt_manager = Manager::new().await?;

    // get the first bluetooth adapter
    let adapters = bt_manager.adapters().await?;
    let central = adapters
        .into_iter()
        .next()
        .context("no bluetooth adapter found")?;
    central.start_scan(ScanFilter::default()).await?;

    let supervisor = supervisor::Supervisor::start(
        &config,
        Arc::new(sampler::BtleSampler::new(central)),
        Arc::new(mqtt_client.clone()),
        monitor::SystemClock,
    )?;
    info!("initial states: {:?}", supervisor.registry().snapshot());
    supervisor.run().await;

    mqtt_client.disconnect().await?;
    Ok(())
}
