use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use rumqttc::{MqttOptions, QoS};

use crate::config;
use crate::messages::PresenceEvent;
use crate::monitor::{PresencePublisher, PublishError};

/// Publishes presence events to a single per-location topic. The payload
/// disambiguates devices, so all loops share this one client.
#[derive(Debug, Clone)]
pub struct MqttClient {
    client: rumqttc::AsyncClient,
    topic: String,
}

impl MqttClient {
    pub fn new(config: &config::MqttConfig, location: &str) -> (Self, rumqttc::EventLoop) {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("bttracker_{location}"));

        let mut mqttoptions = MqttOptions::new(
            client_id,
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        (
            MqttClient {
                client,
                topic: format!("bt/presence/{location}"),
            },
            eventloop,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Services the broker connection for the lifetime of the process.
    /// rumqttc reconnects on its own; errors here only cost queued events,
    /// which is acceptable for best-effort delivery.
    pub async fn drive(mut eventloop: rumqttc::EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    debug!("connected to broker");
                }
                Ok(_) => {}
                Err(e) => {
                    error!("error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        debug!("Disconnecting MQTT client");
        self.client.disconnect().await
    }
}

#[async_trait]
impl PresencePublisher for MqttClient {
    async fn publish(&self, event: &PresenceEvent) -> Result<(), PublishError> {
        info!(
            "Announcing {} as {:?} (rssi: {}) on {}",
            event.name, event.state, event.rssi, self.topic
        );
        let payload = serde_json::to_string(event)?;
        self.client
            .publish(&self.topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }
}
