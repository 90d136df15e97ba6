//! demo - end-to-end synthetic run of the presence watch pipeline

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use presence_watch::config::{DetectionSettings, PresenceSettings};
use presence_watch::detect::BaselinePolicy;
use presence_watch::ingest::{SceneSegment, SyntheticConfig, SyntheticSource};
use presence_watch::notify::{
    message::format_time, AlertMessage, Dispatcher, EvidenceSink, LogSink, MemorySink,
    NotificationSink,
};
use presence_watch::{Monitor, PresenceEvent};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Seconds of empty scene before and after the visit.
    #[arg(long, default_value_t = 3)]
    empty_secs: u32,
    /// Seconds the synthetic subject stays in view.
    #[arg(long, default_value_t = 8)]
    presence_secs: u32,
    /// Dwell threshold in seconds before a presence is confirmed.
    #[arg(long, default_value_t = 5)]
    dwell_secs: u64,
    /// Frames per second of the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Write the confirmation frame as JPEG into this directory.
    #[arg(long)]
    evidence_dir: Option<String>,
    /// Refresh the baseline after this many empty frames.
    #[arg(long)]
    refresh_idle_frames: Option<u32>,
    /// Deterministic noise seed for the synthetic scene.
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    stage("build synthetic scene");
    let mut scene = SyntheticConfig::new(
        args.width,
        args.height,
        args.fps,
        vec![
            SceneSegment::empty(args.empty_secs * args.fps),
            SceneSegment::occupied(args.presence_secs * args.fps),
            SceneSegment::empty(args.empty_secs * args.fps),
        ],
    );
    scene.url = "stub://demo".to_string();
    scene.seed = args.seed;
    let mut source = SyntheticSource::new(scene);
    source.connect()?;

    stage("start notification worker");
    let dwell = Duration::from_secs(args.dwell_secs);
    let memory = MemorySink::new();
    let mut sinks: Vec<Box<dyn NotificationSink>> =
        vec![Box::new(LogSink::new(dwell)), Box::new(memory.clone())];
    if let Some(dir) = &args.evidence_dir {
        sinks.push(Box::new(EvidenceSink::new(dir, true)?));
    }
    let dispatcher = Dispatcher::spawn(sinks, 16)?;

    stage("run detection loop");
    let detection = DetectionSettings {
        baseline_policy: args
            .refresh_idle_frames
            .map(|idle_frames| BaselinePolicy::RefreshWhenIdle { idle_frames })
            .unwrap_or_default(),
        ..DetectionSettings::default()
    };
    let presence = PresenceSettings {
        dwell_threshold: dwell,
        ..PresenceSettings::default()
    };
    let mut monitor = Monitor::from_settings("demo", &detection, &presence)?;
    let stats = monitor.run(&mut source, &dispatcher, &AtomicBool::new(false))?;
    let dispatch = dispatcher.drain()?;

    stage("summary");
    println!(
        "frames: {} processed, {} with motion, {} skipped",
        stats.frames_processed, stats.motion_frames, stats.frames_skipped
    );
    println!(
        "sessions: {} confirmed, {} cleared, baseline refreshes: {}",
        stats.confirmations, stats.clears, stats.baseline_refreshes
    );
    println!(
        "dispatch: {} queued, {} dropped, {} delivered, {} failed",
        dispatch.queued, dispatch.dropped, dispatch.delivered, dispatch.failed
    );
    for notification in memory.notifications() {
        let message = AlertMessage::compose(&notification, dwell);
        match &notification.event {
            PresenceEvent::Confirmed {
                confirmed_at,
                evidence,
                ..
            } => println!(
                "  {} at {} (evidence {}x{}, sha256 {})",
                message.subject,
                format_time(*confirmed_at),
                evidence.width,
                evidence.height,
                &evidence.sha256[..16]
            ),
            PresenceEvent::Cleared { exit_time, .. } => {
                println!("  {} at {}", message.subject, format_time(*exit_time))
            }
        }
    }
    if let Some(dir) = &args.evidence_dir {
        println!("evidence written to {}", dir);
    }
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
