//! Rolling record of per-frame motion signals.

use std::collections::VecDeque;

pub const DEFAULT_HISTORY_WINDOW: usize = 64;

/// Per-frame motion signals.
///
/// Every recorded frame counts towards `len()`, but only the most recent
/// `window` signals are retained. The state machine only ever needs the last one.
#[derive(Clone, Debug)]
pub struct StatusHistory {
    recent: VecDeque<bool>,
    window: usize,
    total: u64,
    absent_run: u64,
}

impl StatusHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            recent: VecDeque::with_capacity(window),
            window,
            total: 0,
            absent_run: 0,
        }
    }

    pub fn push(&mut self, signal: bool) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(signal);
        self.total += 1;
        self.absent_run = if signal { 0 } else { self.absent_run + 1 };
    }

    pub fn last(&self) -> Option<bool> {
        self.recent.back().copied()
    }

    /// Number of signals ever recorded.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Consecutive `false` signals at the end of the history.
    pub fn absent_run(&self) -> u64 {
        self.absent_run
    }

    pub fn recent(&self) -> impl Iterator<Item = bool> + '_ {
        self.recent.iter().copied()
    }
}

impl Default for StatusHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}
