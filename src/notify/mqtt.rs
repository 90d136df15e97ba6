//! MQTT notification sink.
//!
//! Topics, under `<prefix>/<camera_id>`:
//! - `event`: JSON notification plus subject line (QoS 1)
//! - `presence`: retained `ON` / `OFF`
//! - `evidence`: JPEG of the confirmation frame (QoS 1)
//! - `availability`: retained `online`, `offline` as last will

use anyhow::{Context, Result};
use rumqttc::v5::mqttbytes::v5::LastWill;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection, ConnectionError, Event, MqttOptions};
use serde::Serialize;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::{parse_broker_addr, MqttSettings};
use crate::notify::{AlertMessage, NotificationSink};
use crate::{Notification, PresenceEvent};

const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct EventPayload<'a> {
    subject: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

pub struct MqttSink {
    client: Client,
    topic_root: String,
    dwell: Duration,
    _connection: JoinHandle<()>,
}

impl MqttSink {
    pub fn connect(settings: &MqttSettings, camera_id: &str, dwell: Duration) -> Result<Self> {
        let (host, port) = parse_broker_addr(&settings.broker)?;
        let topic_root = topic_root(&settings.topic_prefix, camera_id);
        let availability = format!("{}/availability", topic_root);

        let mut options = MqttOptions::new(settings.client_id.clone(), host, port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_start(true);
        options.set_last_will(LastWill::new(
            availability.clone(),
            PAYLOAD_OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
            None,
        ));

        let (client, connection) = Client::new(options, 10);
        let handle = spawn_connection(connection)?;
        client
            .publish(availability, QoS::AtLeastOnce, true, PAYLOAD_ONLINE.as_bytes().to_vec())
            .context("queue mqtt availability")?;
        log::info!("mqtt sink publishing to {} on {}", topic_root, settings.broker);

        Ok(Self {
            client,
            topic_root,
            dwell,
            _connection: handle,
        })
    }

    fn publish(&self, leaf: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        let topic = format!("{}/{}", self.topic_root, leaf);
        self.client
            .publish(topic.clone(), QoS::AtLeastOnce, retain, payload)
            .with_context(|| format!("publish {}", topic))?;
        Ok(())
    }
}

impl NotificationSink for MqttSink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        let message = AlertMessage::compose(notification, self.dwell);
        let payload = serde_json::to_vec(&EventPayload {
            subject: &message.subject,
            notification,
        })?;
        self.publish("event", payload, false)?;

        match &notification.event {
            PresenceEvent::Confirmed { evidence, .. } => {
                self.publish("presence", b"ON".to_vec(), true)?;
                self.publish("evidence", evidence.encode_jpeg()?, false)?;
            }
            PresenceEvent::Cleared { .. } => {
                self.publish("presence", b"OFF".to_vec(), true)?;
            }
        }
        Ok(())
    }
}

fn topic_root(prefix: &str, camera_id: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), camera_id)
}

fn spawn_connection(mut connection: Connection) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("presence-mqtt".to_string())
        .spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                    Err(ConnectionError::RequestsDone) => break,
                    Err(e) => {
                        log::warn!("MQTT connection error: {}", e);
                        std::thread::sleep(RECONNECT_BACKOFF);
                    }
                }
            }
        })
        .context("spawn mqtt connection thread")
}
