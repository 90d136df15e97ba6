//! Error taxonomy for the monitor.
//!
//! Functions return `anyhow::Result`; the variants below are the errors callers
//! are expected to tell apart (via `downcast_ref`) because each one has its own
//! handling policy:
//!
//! - `Acquisition`: fatal, the detection loop stops.
//! - `DimensionMismatch`: the frame is skipped and logged, the loop continues.
//! - `NotificationDelivery`: logged by the dispatcher, never propagated.
//! - `Configuration`: fatal at startup.
//! - `InvalidFrame`: a frame whose geometry does not match its buffer.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    Acquisition(String),
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    NotificationDelivery {
        sink: &'static str,
        reason: String,
    },
    Configuration(String),
    InvalidFrame(String),
}

impl MonitorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True when the detection loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Acquisition(_) | Self::Configuration(_))
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquisition(reason) => write!(f, "frame acquisition failed: {}", reason),
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "frame is {}x{} but the reference baseline is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            Self::NotificationDelivery { sink, reason } => {
                write!(f, "notification delivery via {} failed: {}", sink, reason)
            }
            Self::Configuration(reason) => write!(f, "invalid configuration: {}", reason),
            Self::InvalidFrame(reason) => write!(f, "invalid frame: {}", reason),
        }
    }
}

impl std::error::Error for MonitorError {}
