use anyhow::Result;
use std::time::Duration;

use crate::notify::{AlertMessage, NotificationSink};
use crate::{Notification, PresenceEvent};

/// Reports notifications through the `log` facade.
pub struct LogSink {
    dwell: Duration,
}

impl LogSink {
    pub fn new(dwell: Duration) -> Self {
        Self { dwell }
    }
}

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        let message = AlertMessage::compose(notification, self.dwell);
        match &notification.event {
            PresenceEvent::Confirmed { regions, .. } => log::info!(
                "[{}] {} ({} region(s) in frame)",
                notification.camera_id,
                message.subject,
                regions.len()
            ),
            PresenceEvent::Cleared { .. } => {
                log::info!("[{}] {}", notification.camera_id, message.subject)
            }
        }
        log::debug!("{}", message.body);
        Ok(())
    }
}
