use mac_address::MacAddress;
use serde_derive::Deserialize;
use thiserror::Error;

use crate::detector::Threshold;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no devices configured; add at least one [[devices]] entry")]
    NoDevices,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_seconds: Option<u64>,
    /// Forms the state topic `bt/presence/<location>`; defaults to the
    /// host name.
    pub location: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeviceConfig {
    pub address: MacAddress,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PresenceConfig {
    /// Exclusive RSSI band that counts as home.
    pub threshold: Threshold,
    pub poll_interval_seconds: u64,
    /// Report `home` at most once per device per local day.
    pub daily: bool,
    /// Compute the daily suspension but keep polling at the normal cadence.
    pub debug: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            threshold: Threshold { low: -10, high: 10 },
            poll_interval_seconds: 30,
            daily: false,
            debug: false,
        }
    }
}
