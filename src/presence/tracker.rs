//! Drives the presence state machine for one stream and turns its
//! transitions into `PresenceEvent`s.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::config::PresenceSettings;
use crate::detect::CandidateRegion;
use crate::error::MonitorError;
use crate::frame::Frame;
use crate::presence::history::StatusHistory;
use crate::presence::state::{PresencePhase, PresenceState, Transition};
use crate::PresenceEvent;

/// Owns the presence state and the status history for one stream.
#[derive(Debug)]
pub struct PresenceTracker {
    state: PresenceState,
    history: StatusHistory,
    dwell: Duration,
}

impl PresenceTracker {
    pub fn new(settings: &PresenceSettings) -> Result<Self> {
        let dwell = Duration::from_std(settings.dwell_threshold).map_err(|_| {
            MonitorError::configuration("dwell threshold is out of range")
        })?;
        Ok(Self::with_dwell(dwell, settings.history_window))
    }

    pub fn with_dwell(dwell: Duration, history_window: usize) -> Self {
        Self {
            state: PresenceState::default(),
            history: StatusHistory::new(history_window),
            dwell,
        }
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn phase(&self) -> PresencePhase {
        self.state.phase()
    }

    pub fn history(&self) -> &StatusHistory {
        &self.history
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Record the signal for `frame` and return the events it produced.
    ///
    /// The frame is copied only when this call confirms a presence.
    pub fn observe(
        &mut self,
        signal: bool,
        now: DateTime<Utc>,
        frame: &Frame,
        regions: &[CandidateRegion],
    ) -> Vec<PresenceEvent> {
        let (next, transitions) = self.state.step(signal, now, self.dwell);
        self.state = next;
        self.history.push(signal);

        let mut events = Vec::new();
        for transition in transitions {
            match transition {
                Transition::Entered { entry_time } => {
                    log::debug!("presence entered at {}", entry_time);
                }
                Transition::Discarded {
                    entry_time,
                    exit_time,
                } => {
                    log::debug!(
                        "brief presence {} -> {} discarded before confirmation",
                        entry_time,
                        exit_time
                    );
                }
                Transition::Confirmed {
                    entry_time,
                    confirmed_at,
                } => events.push(PresenceEvent::Confirmed {
                    entry_time,
                    confirmed_at,
                    evidence: frame.snapshot(),
                    regions: regions.to_vec(),
                }),
                Transition::Cleared {
                    entry_time,
                    exit_time,
                } => events.push(PresenceEvent::Cleared {
                    entry_time,
                    exit_time,
                }),
            }
        }
        events
    }
}
