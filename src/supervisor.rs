use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConfigError};
use crate::detector::Detector;
use crate::monitor::{Clock, DeviceMonitor, PresencePublisher, Sampler};
use crate::registry::DeviceRegistry;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Fans out one monitor loop per configured device and keeps the process
/// resident while they run. Loops are independent: one loop stopping or
/// faulting never affects a sibling.
pub struct Supervisor {
    registry: DeviceRegistry,
    handles: Vec<tokio::task::JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn start<S, P, C>(
        config: &AppConfig,
        sampler: Arc<S>,
        publisher: Arc<P>,
        clock: C,
    ) -> Result<Self, ConfigError>
    where
        S: Sampler + 'static,
        P: PresencePublisher + 'static,
        C: Clock + Clone + 'static,
    {
        // Fail before spawning anything if there is nothing to track.
        config.validate()?;

        let cancel = CancellationToken::new();
        let mut registry = DeviceRegistry::new();
        let mut handles = Vec::new();

        for device in &config.devices {
            let handle = registry.register(device.name.clone(), device.address);
            let monitor = DeviceMonitor::new(
                handle,
                Detector::new(config.presence.threshold, config.presence.daily),
                Duration::from_secs(config.presence.poll_interval_seconds),
                config.presence.debug,
                Arc::clone(&sampler),
                Arc::clone(&publisher),
                clock.clone(),
            );
            handles.push(tokio::spawn(monitor.run(cancel.child_token())));
        }

        info!("tracking {} device(s)", handles.len());
        Ok(Supervisor {
            registry,
            handles,
            cancel,
        })
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Blocks until ctrl-c, then stops the loops.
    pub async fn run(self) {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {err}");
        }
        info!("shutting down");
        self.shutdown().await;
    }

    /// Cancels every loop and waits out a bounded grace period per loop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                error!("a monitor loop did not stop within {SHUTDOWN_GRACE:?}");
            }
        }
        debug!("all monitor loops stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use mac_address::MacAddress;

    use super::*;
    use crate::config::{DeviceConfig, MqttConfig, PresenceConfig};
    use crate::messages::{Presence, PresenceEvent};
    use crate::monitor::{PublishError, SystemClock};

    fn addr(last: u8) -> MacAddress {
        MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, last])
    }

    fn config_with(devices: Vec<DeviceConfig>) -> AppConfig {
        AppConfig {
            mqtt: MqttConfig {
                host: "localhost".to_string(),
                port: None,
                username: None,
                password: None,
                client_id: None,
                keep_alive_seconds: None,
                location: None,
            },
            presence: PresenceConfig::default(),
            devices,
        }
    }

    /// Address ...:01 is reliably in range, ...:02 always faults.
    struct SplitSampler;

    #[async_trait]
    impl Sampler for SplitSampler {
        async fn sample(&self, address: &MacAddress) -> anyhow::Result<Option<i16>> {
            match address.bytes()[5] {
                1 => Ok(Some(5)),
                2 => Err(anyhow!("adapter gone")),
                _ => Ok(None),
            }
        }
    }

    struct CountingPublisher {
        published: AtomicUsize,
    }

    #[async_trait]
    impl PresencePublisher for CountingPublisher {
        async fn publish(&self, _event: &PresenceEvent) -> Result<(), PublishError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_empty_device_list_fails_fast() {
        let result = Supervisor::start(
            &config_with(vec![]),
            Arc::new(SplitSampler),
            Arc::new(CountingPublisher {
                published: AtomicUsize::new(0),
            }),
            SystemClock,
        );
        assert!(matches!(result, Err(ConfigError::NoDevices)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_run_independently_and_stop_on_shutdown() {
        let publisher = Arc::new(CountingPublisher {
            published: AtomicUsize::new(0),
        });
        let supervisor = Supervisor::start(
            &config_with(vec![
                DeviceConfig {
                    name: "steady".to_string(),
                    address: addr(1),
                },
                DeviceConfig {
                    name: "flaky".to_string(),
                    address: addr(2),
                },
            ]),
            Arc::new(SplitSampler),
            Arc::clone(&publisher),
            SystemClock,
        )
        .unwrap();
        assert_eq!(supervisor.registry().snapshot().len(), 2);

        // Let both loops complete a few 30s cycles in paused time.
        tokio::time::sleep(Duration::from_secs(95)).await;

        let snapshot = supervisor.registry().snapshot();
        assert_eq!(snapshot[0].name, "steady");
        assert_eq!(snapshot[0].state, Presence::Home);
        assert_eq!(snapshot[1].name, "flaky");
        assert_eq!(snapshot[1].state, Presence::NotHome);

        // Both loops published every cycle despite one sampler faulting.
        assert!(publisher.published.load(Ordering::SeqCst) >= 6);

        supervisor.shutdown().await;
    }
}
