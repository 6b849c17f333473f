use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use mac_address::MacAddress;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::detector::Detector;
use crate::messages::PresenceEvent;
use crate::registry::DeviceHandle;

/// One RSSI reading on demand. `Ok(None)` means the address was not observed
/// this cycle; errors are mapped to absent by the monitor loop.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self, address: &MacAddress) -> anyhow::Result<Option<i16>>;
}

#[async_trait]
impl<T: Sampler + ?Sized> Sampler for std::sync::Arc<T> {
    async fn sample(&self, address: &MacAddress) -> anyhow::Result<Option<i16>> {
        (**self).sample(address).await
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("serializing presence event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("mqtt publish failed: {0}")]
    Transport(#[from] rumqttc::ClientError),
    #[error("broker rejected event: {0}")]
    Rejected(String),
}

/// Best-effort delivery of a presence event. Failures come back so the loop
/// can log them, but they are never retried or propagated.
#[async_trait]
pub trait PresencePublisher: Send + Sync {
    async fn publish(&self, event: &PresenceEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: PresencePublisher + ?Sized> PresencePublisher for std::sync::Arc<T> {
    async fn publish(&self, event: &PresenceEvent) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}

/// Wall-clock seam so tests can steer day boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Polls one address forever, feeding the detector and publishing every
/// classification. Owns its device's state cell; never touches another
/// device's.
pub struct DeviceMonitor<S, P, C> {
    device: DeviceHandle,
    detector: Detector,
    poll_interval: Duration,
    debug: bool,
    sampler: S,
    publisher: P,
    clock: C,
}

impl<S, P, C> DeviceMonitor<S, P, C>
where
    S: Sampler,
    P: PresencePublisher,
    C: Clock,
{
    pub fn new(
        device: DeviceHandle,
        detector: Detector,
        poll_interval: Duration,
        debug: bool,
        sampler: S,
        publisher: P,
        clock: C,
    ) -> Self {
        DeviceMonitor {
            device,
            detector,
            poll_interval,
            debug,
            sampler,
            publisher,
            clock,
        }
    }

    /// Run until the token is cancelled. All per-cycle faults are contained
    /// here; nothing escapes the loop.
    pub async fn run(self, cancel: CancellationToken) {
        info!("watching {} ({})", self.device.name, self.device.address);
        loop {
            let wait = self.cycle().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        debug!("monitor for {} stopped", self.device.name);
    }

    /// One poll cycle; returns how long to sleep before the next one.
    async fn cycle(&self) -> Duration {
        // A single reading serves both the absence check and the threshold
        // check. Sampler faults count as not observed.
        let sample = match self.sampler.sample(&self.device.address).await {
            Ok(reading) => reading.map(i32::from),
            Err(err) => {
                debug!("sampling {} failed: {err:#}", self.device.name);
                None
            }
        };

        let classification = self.detector.classify(sample, self.clock.now());
        debug!(
            "addr: {}, rssi: {:?} -> {:?}",
            self.device.address, sample, classification.state
        );

        if self.device.state() != classification.state {
            info!("{} is now {:?}", self.device.name, classification.state);
        }
        self.device.set_state(classification.state);

        let event =
            PresenceEvent::new(&self.device.name, classification.state, classification.rssi);
        if let Err(err) = self.publisher.publish(&event).await {
            warn!("publish for {} failed: {err}", self.device.name);
        }

        if let Some(deadline) = classification.suspend_until {
            let remaining = (deadline - self.clock.now()).num_seconds().max(0) as u64;
            if self.debug {
                debug!("seconds until tomorrow: {remaining}");
            } else {
                // Presence for the day is confirmed; skip the wasted wake-ups
                // until the next local midnight.
                return Duration::from_secs(remaining) + self.poll_interval;
            }
        }
        self.poll_interval
    }
}
