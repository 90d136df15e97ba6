//! Presence watch
//!
//! Watches a single video stream and reports subjects that stay in view for too long.
//!
//! # Architecture
//!
//! Each frame passes through two stages:
//!
//! 1. **Motion detection** (`detect`): the frame is converted to grayscale,
//!    blurred and differenced against a reference baseline taken from the first
//!    frame. Changed areas are dilated, outlined, and kept if they are large
//!    enough. The result is one boolean motion signal per frame.
//! 2. **Presence tracking** (`presence`): the signal stream is debounced into
//!    sessions. A session that lasts past the dwell threshold is confirmed once;
//!    when a confirmed subject leaves, the session is cleared.
//!
//! Confirmations and clears are handed to `notify`, which delivers them on a
//! background worker so slow sinks never stall frame processing.
//!
//! # Module Structure
//!
//! - `frame`: Frame container and owned evidence snapshots
//! - `ingest`: Frame sources (synthetic `stub://`, V4L2 devices)
//! - `detect`: Preprocessor, reference baseline, motion segmenter
//! - `presence`: State machine, status history, tracker
//! - `notify`: Sink trait, dispatcher, log/evidence/MQTT/webhook sinks
//! - `monitor`: The per-frame loop
//! - `config`: Defaults, config file, environment overrides
//! - Core types: `PresenceEvent`, `Notification`

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::OnceLock;

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod monitor;
pub mod notify;
pub mod presence;

pub use config::MonitorConfig;
pub use detect::{CandidateRegion, MotionDetector, MotionResult, Observation};
pub use error::MonitorError;
pub use frame::{EvidenceFrame, Frame, PixelFormat};
pub use ingest::{FrameSource, SyntheticSource, VideoSource};
pub use monitor::{Monitor, MonitorStats};
pub use notify::{Dispatcher, NotificationSink};
pub use presence::{PresencePhase, PresenceTracker};

// -------------------- Events --------------------

/// Event emitted by the presence tracker.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind")]
pub enum PresenceEvent {
    /// Subject has been in view for at least the dwell threshold.
    #[serde(rename = "PresenceConfirmed")]
    Confirmed {
        entry_time: DateTime<Utc>,
        confirmed_at: DateTime<Utc>,
        evidence: EvidenceFrame,
        regions: Vec<CandidateRegion>,
    },
    /// A confirmed subject has left.
    #[serde(rename = "PresenceCleared")]
    Cleared {
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
    },
}

impl PresenceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PresenceEvent::Confirmed { .. } => "PresenceConfirmed",
            PresenceEvent::Cleared { .. } => "PresenceCleared",
        }
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        match self {
            PresenceEvent::Confirmed { entry_time, .. } | PresenceEvent::Cleared { entry_time, .. } => {
                *entry_time
            }
        }
    }

    /// Identifier shared by the confirmation and the clear of one session.
    pub fn incident_id(&self) -> String {
        incident_id(self.entry_time())
    }
}

pub fn incident_id(entry_time: DateTime<Utc>) -> String {
    format!("incident-{}", entry_time.format("%Y%m%d-%H%M%S"))
}

/// Event plus the stream it came from. This is what sinks receive.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub camera_id: String,
    pub incident_id: String,
    #[serde(flatten)]
    pub event: PresenceEvent,
}

impl Notification {
    pub fn new(camera_id: impl Into<String>, event: PresenceEvent) -> Self {
        Self {
            camera_id: camera_id.into(),
            incident_id: event.incident_id(),
            event,
        }
    }
}

// -------------------- Validation --------------------

pub fn validate_camera_id(camera_id: &str) -> Result<()> {
    static CAMERA_ID_RE: OnceLock<Option<regex::Regex>> = OnceLock::new();
    let re = CAMERA_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[a-z0-9_-]{1,64}$").ok())
        .as_ref()
        .ok_or_else(|| anyhow!("camera id pattern failed to compile"))?;

    let id = camera_id.to_lowercase();
    if !re.is_match(&id) {
        return Err(MonitorError::configuration(format!(
            "camera id '{}' must match ^[a-z0-9_-]{{1,64}}$",
            camera_id
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn incident_id_uses_entry_time() {
        let entry = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let event = PresenceEvent::Cleared {
            entry_time: entry,
            exit_time: entry + chrono::Duration::minutes(7),
        };
        assert_eq!(event.incident_id(), "incident-20240309-140507");
        assert_eq!(event.kind(), "PresenceCleared");
    }

    #[test]
    fn notification_serializes_with_kind_tag() {
        let entry = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let n = Notification::new(
            "porch",
            PresenceEvent::Cleared {
                entry_time: entry,
                exit_time: entry,
            },
        );
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "PresenceCleared");
        assert_eq!(json["camera_id"], "porch");
        assert_eq!(json["incident_id"], "incident-20240309-140507");
    }

    #[test]
    fn camera_id_validation() {
        assert!(validate_camera_id("front_door").is_ok());
        assert!(validate_camera_id("Garage-2").is_ok());
        assert!(validate_camera_id("").is_err());
        assert!(validate_camera_id("has space").is_err());
    }
}
