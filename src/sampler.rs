use async_trait::async_trait;
use btleplug::api::{BDAddr, Central as _, Peripheral as _};
use btleplug::platform::Adapter;
use mac_address::MacAddress;

use crate::monitor::Sampler;

/// Reads advertised RSSI values off the bluetooth adapter. A background scan
/// is started once at startup; each call just inspects the most recent
/// advertisement seen for the address.
pub struct BtleSampler {
    adapter: Adapter,
}

impl BtleSampler {
    pub fn new(adapter: Adapter) -> Self {
        BtleSampler { adapter }
    }
}

#[async_trait]
impl Sampler for BtleSampler {
    async fn sample(&self, address: &MacAddress) -> anyhow::Result<Option<i16>> {
        let target = BDAddr::from(address.bytes());
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address() == target {
                let properties = peripheral.properties().await?;
                return Ok(properties.and_then(|p| p.rssi));
            }
        }
        Ok(None)
    }
}
