//! presenced - presence watch daemon
//!
//! This daemon:
//! 1. Loads configuration (PRESENCE_CONFIG file + PRESENCE_* environment)
//! 2. Opens the configured video source
//! 3. Runs motion detection and presence tracking on every frame
//! 4. Hands confirmations and clears to the notification sinks
//! 5. Stops on Ctrl-C / SIGTERM, optionally removing saved evidence

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use presence_watch::ingest::VideoSource;
use presence_watch::notify::{build_sinks, evidence, Dispatcher};
use presence_watch::{Monitor, MonitorConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = MonitorConfig::load()?;
    log::info!(
        "presenced {} starting for camera {}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera_id
    );
    log::info!(
        "source={} {}x{} @ {} fps",
        cfg.source.url,
        cfg.source.width,
        cfg.source.height,
        cfg.source.target_fps
    );
    log::info!(
        "detection: min_area={:?} diff_threshold={} dilation={} blur={} baseline={:?}",
        cfg.detection.min_area,
        cfg.detection.diff_threshold,
        cfg.detection.dilation_iterations,
        cfg.detection.blur_kernel,
        cfg.detection.baseline_policy
    );
    log::info!(
        "presence: dwell={}s history_window={}",
        cfg.presence.dwell_threshold.as_secs(),
        cfg.presence.history_window
    );

    let mut monitor = Monitor::new(&cfg)?;
    let mut source = VideoSource::open(&cfg.source)?;
    source.connect()?;

    let sinks = build_sinks(&cfg)?;
    let dispatcher = Dispatcher::spawn(sinks, cfg.notify.queue_capacity)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        signal_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("presenced running (Ctrl-C to stop)");
    let outcome = monitor.run(&mut source, &dispatcher, &shutdown);

    let dispatch = dispatcher.abandon();
    log::info!(
        "notifications: queued={} dropped={} delivered={} failed={}",
        dispatch.queued,
        dispatch.dropped,
        dispatch.delivered,
        dispatch.failed
    );

    if cfg.notify.cleanup_on_exit {
        if let Some(dir) = &cfg.notify.evidence_dir {
            match evidence::clean_dir(dir) {
                Ok(removed) => log::info!("removed {} evidence file(s) from {}", removed, dir.display()),
                Err(e) => log::warn!("evidence cleanup failed: {:#}", e),
            }
        }
    }

    let stats = outcome?;
    log::info!(
        "stopped after {} frames ({} skipped, {} with motion, {} confirmed, {} cleared)",
        stats.frames_processed,
        stats.frames_skipped,
        stats.motion_frames,
        stats.confirmations,
        stats.clears
    );
    Ok(())
}
