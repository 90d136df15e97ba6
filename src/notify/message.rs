//! Human-readable alert text.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{Notification, PresenceEvent};

pub const TIME_FORMAT: &str = "%b %d, %Y, at %I:%M:%S %p UTC";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Text for a notification. `dwell` is the configured confirmation threshold.
    pub fn compose(notification: &Notification, dwell: Duration) -> Self {
        let incident = &notification.incident_id;
        match &notification.event {
            PresenceEvent::Confirmed {
                entry_time,
                evidence,
                ..
            } => {
                let entered = format_time(*entry_time);
                let minutes = rounded_minutes(dwell.as_secs() as i64);
                Self {
                    subject: format!(
                        "Security Alert {}: Unusual Prolonged Presence Detected",
                        incident
                    ),
                    body: format!(
                        "A subject entered the area watched by camera '{}' on {} and has \
                         remained in view for more than {} minute(s).\n\n\
                         Incident: {}\nFirst seen: {}\nThreshold: {} minute(s)\n\
                         Captured frame: {}x{}, sha256 {}\n",
                        notification.camera_id,
                        entered,
                        minutes,
                        incident,
                        entered,
                        minutes,
                        evidence.width,
                        evidence.height,
                        evidence.sha256
                    ),
                }
            }
            PresenceEvent::Cleared {
                entry_time,
                exit_time,
            } => {
                let stayed = exit_time.signed_duration_since(*entry_time).num_seconds();
                Self {
                    subject: format!(
                        "Security Update on {}: Detected Individual Has Left the Monitored Area",
                        incident
                    ),
                    body: format!(
                        "The subject reported in {} has left the area watched by camera '{}'.\n\n\
                         First seen: {}\nLeft: {}\nTime in view: about {} minute(s)\n",
                        incident,
                        notification.camera_id,
                        format_time(*entry_time),
                        format_time(*exit_time),
                        rounded_minutes(stayed)
                    ),
                }
            }
        }
    }
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Whole minutes, rounded half up.
pub fn rounded_minutes(seconds: i64) -> i64 {
    (seconds.max(0) + 30) / 60
}
