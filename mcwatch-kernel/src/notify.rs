//! Notification sinks. Delivery is best effort: callers log failures and
//! move on.

use crate::config::{MqttConf, NotifySink};
use crate::discord::DiscordClient;
use crate::error::DeliveryError;
use crate::models::Notification;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::task;
use tracing::{debug, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Picks the sink for `sink`; `None` when no destination is configured.
pub fn build_notifier(sink: &NotifySink, discord: &DiscordClient) -> Option<Arc<dyn Notifier>> {
    match sink {
        NotifySink::Discord { channel_id: Some(channel_id) } => {
            Some(Arc::new(DiscordNotifier::new(discord.clone(), channel_id.clone())))
        }
        NotifySink::Discord { channel_id: None } => {
            warn!("STATUS_CHANNEL_ID is not set, automated updates are disabled");
            None
        }
        NotifySink::Mqtt(conf) => Some(Arc::new(MqttNotifier::connect(conf))),
    }
}

/// Posts the rendered text to one Discord channel.
pub struct DiscordNotifier {
    client: DiscordClient,
    channel_id: String,
}

impl DiscordNotifier {
    pub fn new(client: DiscordClient, channel_id: impl Into<String>) -> Self {
        Self { client, channel_id: channel_id.into() }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.client
            .send_message(&self.channel_id, &notification.render())
            .await?;
        Ok(())
    }
}

/// Payload published by `MqttNotifier`.
#[derive(Debug, Serialize)]
pub struct StatusEvent {
    pub state: &'static str,
    pub online: Option<u32>,
    pub max: Option<u32>,
    pub names: Vec<String>,
    pub text: String,
    pub ts: String,
}

impl StatusEvent {
    pub fn new(notification: &Notification, at: OffsetDateTime) -> Self {
        let ts = at.format(&Rfc3339).unwrap_or_default();
        let text = notification.render();
        match notification {
            Notification::Online(snapshot) => Self {
                state: "online",
                online: Some(snapshot.online),
                max: Some(snapshot.capacity),
                names: snapshot.names.clone(),
                text,
                ts,
            },
            Notification::Offline => Self {
                state: "offline",
                online: None,
                max: None,
                names: Vec::new(),
                text,
                ts,
            },
        }
    }
}

/// Requests the client may buffer while the broker is away.
pub const MQTT_QUEUE_CAPACITY: usize = 10;

/// Publishes a JSON `StatusEvent` per transition on an MQTT topic.
///
/// Publishing only enqueues for the event loop. A full queue is a delivery
/// error, never a wait.
pub struct MqttNotifier {
    client: AsyncClient,
    topic: String,
}

impl MqttNotifier {
    /// Creates the client and spawns the task driving its event loop.
    pub fn connect(conf: &MqttConf) -> Self {
        let mut opts = MqttOptions::new("mcwatch-notifier", &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, MQTT_QUEUE_CAPACITY);

        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => debug!("mqtt connected"),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = ?e, "mqtt connection error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Self { client, topic: conf.topic.clone() }
    }
}

#[async_trait]
impl Notifier for MqttNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let event = StatusEvent::new(notification, OffsetDateTime::now_utc());
        let payload = serde_json::to_vec(&event)?;
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Snapshot;
    use std::time::Instant;
    use time::macros::datetime;

    #[test]
    fn online_event_carries_counts_and_names() {
        let notification = Notification::Online(Snapshot {
            online: 2,
            capacity: 10,
            names: vec!["alex".into(), "steve".into()],
        });
        let event = StatusEvent::new(&notification, datetime!(2024-05-01 12:00 UTC));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["state"], "online");
        assert_eq!(json["online"], 2);
        assert_eq!(json["max"], 10);
        assert_eq!(json["names"], serde_json::json!(["alex", "steve"]));
        assert_eq!(json["ts"], "2024-05-01T12:00:00Z");
        assert!(json["text"].as_str().unwrap().contains("Players: 2 / 10"));
    }

    #[test]
    fn offline_event_has_no_counts() {
        let event = StatusEvent::new(&Notification::Offline, datetime!(2024-05-01 12:00 UTC));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["state"], "offline");
        assert!(json["online"].is_null());
        assert!(json["max"].is_null());
        assert_eq!(json["text"], crate::format::OFFLINE_ANNOUNCEMENT);
    }

    #[tokio::test]
    async fn unreachable_broker_never_blocks_delivery() {
        let notifier = MqttNotifier::connect(&MqttConf {
            host: "127.0.0.1".into(),
            port: 1,
            topic: "mcwatch/test".into(),
        });

        let mut failures = 0;
        for _ in 0..MQTT_QUEUE_CAPACITY * 2 {
            let started = Instant::now();
            let delivered = tokio::time::timeout(
                Duration::from_secs(1),
                notifier.deliver(&Notification::Offline),
            )
            .await
            .expect("deliver must not wait on the broker");
            assert!(started.elapsed() < Duration::from_secs(1));
            if let Err(e) = delivered {
                assert!(matches!(e, DeliveryError::Mqtt(_)));
                failures += 1;
            }
        }
        assert!(failures > 0, "a full queue must surface as an error");
    }
}
