//! The per-frame detection loop.
//!
//! Frames are handled strictly in order on the calling thread:
//! detect -> track -> hand events to the dispatcher. Nothing here waits on a
//! sink. Dimension mismatches and other non-fatal frame errors skip the frame.
//! An acquisition failure ends the loop with an error. The shutdown flag ends it
//! cleanly between frames.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{DetectionSettings, MonitorConfig, PresenceSettings};
use crate::detect::{MotionDetector, Observation};
use crate::error::MonitorError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::notify::Dispatcher;
use crate::presence::PresenceTracker;
use crate::{Notification, PresenceEvent};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Frames recorded in the status history (baseline frame included).
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub motion_frames: u64,
    pub confirmations: u64,
    pub clears: u64,
    pub baseline_refreshes: u64,
    pub notifications_dropped: u64,
}

pub struct Monitor {
    camera_id: String,
    detector: MotionDetector,
    tracker: PresenceTracker,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        Self::from_settings(&config.camera_id, &config.detection, &config.presence)
    }

    pub fn from_settings(
        camera_id: &str,
        detection: &DetectionSettings,
        presence: &PresenceSettings,
    ) -> Result<Self> {
        Ok(Self {
            camera_id: camera_id.to_string(),
            detector: MotionDetector::new(detection)?,
            tracker: PresenceTracker::new(presence)?,
            stats: MonitorStats::default(),
        })
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    /// Run one frame through detection and tracking.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<Notification>> {
        let observation = self.detector.observe(frame)?;
        let (signal, regions) = match &observation {
            Observation::BaselineSeeded => (false, &[][..]),
            Observation::Skipped(err) => {
                self.stats.frames_skipped += 1;
                log::warn!("skipping frame captured at {}: {}", frame.captured_at, err);
                return Ok(Vec::new());
            }
            Observation::Analyzed(result) => (result.motion, result.regions.as_slice()),
        };

        self.stats.frames_processed += 1;
        if signal {
            self.stats.motion_frames += 1;
        }

        let events = self
            .tracker
            .observe(signal, frame.captured_at, frame, regions);

        let session_open = self.tracker.state().session.is_some();
        let absent_run = self.tracker.history().absent_run();
        if self
            .detector
            .refresh_baseline_if_due(session_open, absent_run, frame.captured_at)
        {
            self.stats.baseline_refreshes += 1;
        }

        Ok(events
            .into_iter()
            .map(|event| {
                match &event {
                    PresenceEvent::Confirmed { entry_time, .. } => {
                        self.stats.confirmations += 1;
                        log::info!(
                            "[{}] presence confirmed (in view since {})",
                            self.camera_id,
                            entry_time
                        );
                    }
                    PresenceEvent::Cleared {
                        entry_time,
                        exit_time,
                    } => {
                        self.stats.clears += 1;
                        log::info!(
                            "[{}] presence cleared ({} -> {})",
                            self.camera_id,
                            entry_time,
                            exit_time
                        );
                    }
                }
                Notification::new(self.camera_id.clone(), event)
            })
            .collect())
    }

    /// Pull frames until the source ends or `shutdown` is set.
    pub fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
        dispatcher: &Dispatcher,
        shutdown: &AtomicBool,
    ) -> Result<MonitorStats> {
        let mut last_health_log = Instant::now();

        while !shutdown.load(Ordering::SeqCst) {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("[{}] source reached end of stream", self.camera_id);
                    break;
                }
                Err(err) => {
                    return Err(MonitorError::Acquisition(format!("{:#}", err)).into());
                }
            };

            let notifications = match self.process_frame(&frame) {
                Ok(notifications) => notifications,
                Err(err) => match err.downcast_ref::<MonitorError>() {
                    Some(kind) if !kind.is_fatal() => {
                        self.stats.frames_skipped += 1;
                        log::warn!("[{}] dropping frame: {}", self.camera_id, kind);
                        continue;
                    }
                    _ => return Err(err),
                },
            };
            for notification in notifications {
                if !dispatcher.publish(notification) {
                    self.stats.notifications_dropped += 1;
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "[{}] health: source_ok={}, frames={}, skipped={}, phase={:?}, dispatch={:?}",
                    self.camera_id,
                    source.is_healthy(),
                    self.stats.frames_processed,
                    self.stats.frames_skipped,
                    self.tracker.phase(),
                    dispatcher.stats()
                );
                last_health_log = Instant::now();
            }
        }

        Ok(self.stats.clone())
    }
}
