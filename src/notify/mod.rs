//! Notification delivery.
//!
//! The detection loop never talks to a sink directly. It hands each
//! `Notification` to the `Dispatcher`, which queues it (bounded, non-blocking)
//! for a background worker that calls every configured sink in turn.
//!
//! Sinks are responsible for:
//! - Formatting the event for their medium (`message`)
//! - Reporting failures as errors (the worker logs them)
//!
//! Sinks MUST NOT:
//! - Retry indefinitely or block the worker for long periods
//! - Assume delivery order across different presence sessions

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::Notification;

pub mod dispatcher;
pub mod evidence;
pub mod log_sink;
pub mod message;
pub mod mqtt;
#[cfg(feature = "notify-webhook")]
pub mod webhook;

pub use dispatcher::{DispatchStats, Dispatcher};
pub use evidence::EvidenceSink;
pub use log_sink::LogSink;
pub use message::AlertMessage;
pub use mqtt::MqttSink;
#[cfg(feature = "notify-webhook")]
pub use webhook::WebhookSink;

/// Destination for presence notifications.
pub trait NotificationSink: Send {
    /// Sink identifier used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one notification. Errors are logged by the caller and dropped.
    fn deliver(&mut self, notification: &Notification) -> Result<()>;
}

/// Sink that keeps every notification in memory.
///
/// Clones share the same buffer, so one clone can be handed to the dispatcher
/// while another is inspected afterwards.
#[derive(Clone, Default)]
pub struct MemorySink {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        match self.received.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        let mut guard = self
            .received
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?;
        guard.push(notification.clone());
        Ok(())
    }
}

/// Build the sinks described by the configuration. The log sink is always present.
pub fn build_sinks(config: &MonitorConfig) -> Result<Vec<Box<dyn NotificationSink>>> {
    let dwell: Duration = config.presence.dwell_threshold;
    let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(LogSink::new(dwell))];

    if let Some(dir) = &config.notify.evidence_dir {
        sinks.push(Box::new(EvidenceSink::new(
            dir,
            config.notify.annotate_evidence,
        )?));
    }
    if let Some(mqtt) = &config.notify.mqtt {
        sinks.push(Box::new(MqttSink::connect(mqtt, &config.camera_id, dwell)?));
    }
    #[cfg(feature = "notify-webhook")]
    if let Some(url) = &config.notify.webhook_url {
        sinks.push(Box::new(WebhookSink::new(url, dwell)?));
    }

    log::info!(
        "notification sinks: {}",
        sinks
            .iter()
            .map(|sink| sink.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(sinks)
}
