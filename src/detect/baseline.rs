//! Reference baseline that every frame is differenced against.

use chrono::{DateTime, Utc};
use image::GrayImage;

/// When, if ever, the reference baseline is replaced after it is first set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BaselinePolicy {
    /// Baseline is the first frame for the whole run.
    #[default]
    Static,
    /// Replace the baseline each time the empty run reaches another multiple
    /// of `idle_frames`, while no presence session is open.
    RefreshWhenIdle { idle_frames: u32 },
}

/// The preprocessed frame all later frames are compared against.
#[derive(Debug, Default)]
pub struct ReferenceBaseline {
    image: Option<GrayImage>,
    policy: BaselinePolicy,
    set_at: Option<DateTime<Utc>>,
    refreshes: u64,
}

impl ReferenceBaseline {
    pub fn new(policy: BaselinePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    pub fn policy(&self) -> BaselinePolicy {
        self.policy
    }

    pub fn set_at(&self) -> Option<DateTime<Utc>> {
        self.set_at
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Set the baseline if none exists yet. Returns true when it was set.
    pub fn seed(&mut self, image: GrayImage, at: DateTime<Utc>) -> bool {
        if self.image.is_some() {
            return false;
        }
        self.image = Some(image);
        self.set_at = Some(at);
        true
    }

    /// Whether the policy allows a refresh given the current empty run.
    ///
    /// At most one refresh per `idle_frames` window, so a subject that enters
    /// slowly still accumulates a difference against an older baseline.
    pub fn refresh_due(&self, session_open: bool, absent_run: u64) -> bool {
        match self.policy {
            BaselinePolicy::Static => false,
            BaselinePolicy::RefreshWhenIdle { idle_frames } => {
                self.is_seeded()
                    && !session_open
                    && absent_run > 0
                    && absent_run.checked_rem(u64::from(idle_frames)) == Some(0)
            }
        }
    }

    pub fn replace(&mut self, image: GrayImage, at: DateTime<Utc>) {
        self.image = Some(image);
        self.set_at = Some(at);
        self.refreshes += 1;
    }
}
