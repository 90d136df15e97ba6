//! Debouncing per-frame motion into presence sessions.

pub mod history;
pub mod state;
pub mod tracker;

pub use history::StatusHistory;
pub use state::{PresencePhase, PresenceSession, PresenceState, Transition};
pub use tracker::PresenceTracker;
