//! Single entry point into motion detection: preprocess, seed or compare
//! against the baseline, and refresh it when the policy says so.

use anyhow::Result;
use chrono::{DateTime, Utc};
use image::GrayImage;

use crate::config::DetectionSettings;
use crate::detect::baseline::ReferenceBaseline;
use crate::detect::preprocess::Preprocessor;
use crate::detect::result::MotionResult;
use crate::detect::segmenter::{MotionSegmenter, SegmenterParams};
use crate::error::MonitorError;
use crate::frame::Frame;

/// What the detector made of one frame.
#[derive(Debug)]
pub enum Observation {
    /// First frame of the run; it became the reference baseline.
    BaselineSeeded,
    /// Frame was not comparable with the baseline and was dropped.
    Skipped(MonitorError),
    Analyzed(MotionResult),
}

impl Observation {
    /// Motion signal for the presence tracker, `None` for skipped frames.
    pub fn signal(&self) -> Option<bool> {
        match self {
            Observation::BaselineSeeded => Some(false),
            Observation::Skipped(_) => None,
            Observation::Analyzed(result) => Some(result.motion),
        }
    }
}

/// Preprocessor, baseline and segmenter wired together.
pub struct MotionDetector {
    preprocessor: Preprocessor,
    baseline: ReferenceBaseline,
    segmenter: MotionSegmenter,
    /// Most recent analyzed frame, kept as a refresh candidate.
    last_analyzed: Option<GrayImage>,
}

impl MotionDetector {
    pub fn new(settings: &DetectionSettings) -> Result<Self> {
        let preprocessor = Preprocessor::new(settings.blur_kernel)?;
        let segmenter = MotionSegmenter::new(SegmenterParams {
            diff_threshold: settings.diff_threshold,
            dilation_iterations: settings.dilation_iterations,
            min_area: settings.min_area,
        });
        Ok(Self {
            preprocessor,
            baseline: ReferenceBaseline::new(settings.baseline_policy),
            segmenter,
            last_analyzed: None,
        })
    }

    pub fn baseline(&self) -> &ReferenceBaseline {
        &self.baseline
    }

    pub fn segmenter(&self) -> &MotionSegmenter {
        &self.segmenter
    }

    pub fn observe(&mut self, frame: &Frame) -> Result<Observation> {
        let gray = self.preprocessor.apply(frame)?;

        let Some(reference) = self.baseline.image() else {
            self.baseline.seed(gray, frame.captured_at);
            log::info!(
                "reference baseline set from {}x{} frame at {}",
                frame.width,
                frame.height,
                frame.captured_at
            );
            return Ok(Observation::BaselineSeeded);
        };

        match self.segmenter.segment(reference, &gray) {
            Ok(result) => {
                self.last_analyzed = Some(gray);
                Ok(Observation::Analyzed(result))
            }
            Err(err @ MonitorError::DimensionMismatch { .. }) => Ok(Observation::Skipped(err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the baseline with the last analyzed frame when the policy allows.
    pub fn refresh_baseline_if_due(
        &mut self,
        session_open: bool,
        absent_run: u64,
        at: DateTime<Utc>,
    ) -> bool {
        if !self.baseline.refresh_due(session_open, absent_run) {
            return false;
        }
        let Some(candidate) = self.last_analyzed.take() else {
            return false;
        };
        self.baseline.replace(candidate, at);
        log::info!(
            "reference baseline refreshed after {} empty frames (refresh #{})",
            absent_run,
            self.baseline.refreshes()
        );
        true
    }
}
