//! Presence state machine.
//!
//! `PresenceState::step` is a pure function of the previous state, the motion
//! signal for the current frame and the current time. It never touches I/O and
//! never fails; the tracker owns sequencing and evidence capture.
//!
//! Per frame, in this order:
//! 1. Entry: signal rose 0 -> 1, a session opens at `now`.
//! 2. Exit: signal fell 1 -> 0, the session closes. A confirmed session yields
//!    `Cleared`, an unconfirmed one is discarded.
//! 3. Dwell: an open, unconfirmed session older than the dwell threshold
//!    yields `Confirmed` exactly once.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresenceSession {
    pub entry_time: DateTime<Utc>,
    pub alert_sent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresencePhase {
    Idle,
    ActiveUnconfirmed,
    ActiveConfirmed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresenceState {
    /// Signal recorded for the previous frame (false before the first frame).
    pub last_signal: bool,
    pub session: Option<PresenceSession>,
}

/// Outputs of one step. Only `Confirmed` and `Cleared` leave the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Entered {
        entry_time: DateTime<Utc>,
    },
    Confirmed {
        entry_time: DateTime<Utc>,
        confirmed_at: DateTime<Utc>,
    },
    Cleared {
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
    },
    Discarded {
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
    },
}

impl PresenceState {
    pub fn phase(&self) -> PresencePhase {
        match self.session {
            None => PresencePhase::Idle,
            Some(PresenceSession {
                alert_sent: false, ..
            }) => PresencePhase::ActiveUnconfirmed,
            Some(PresenceSession {
                alert_sent: true, ..
            }) => PresencePhase::ActiveConfirmed,
        }
    }

    #[must_use]
    pub fn step(
        self,
        signal: bool,
        now: DateTime<Utc>,
        dwell: Duration,
    ) -> (PresenceState, Vec<Transition>) {
        let mut next = self;
        let mut out = Vec::new();

        if signal && !self.last_signal {
            next.session = Some(PresenceSession {
                entry_time: now,
                alert_sent: false,
            });
            out.push(Transition::Entered { entry_time: now });
        }

        if !signal && self.last_signal {
            if let Some(session) = next.session.take() {
                out.push(if session.alert_sent {
                    Transition::Cleared {
                        entry_time: session.entry_time,
                        exit_time: now,
                    }
                } else {
                    Transition::Discarded {
                        entry_time: session.entry_time,
                        exit_time: now,
                    }
                });
            }
        }

        if let Some(session) = next.session.as_mut() {
            if !session.alert_sent && now.signed_duration_since(session.entry_time) >= dwell {
                session.alert_sent = true;
                out.push(Transition::Confirmed {
                    entry_time: session.entry_time,
                    confirmed_at: now,
                });
            }
        }

        next.last_signal = signal;
        (next, out)
    }
}
