//! Scripted synthetic scene (`stub://` URLs).
//!
//! The scene is a fixed textured background. During occupied segments a bright
//! square (the "subject") drifts across it. Timestamps come from a simulated
//! clock advancing by `1 / target_fps` per frame, so dwell thresholds of minutes
//! can be exercised in milliseconds unless pacing is switched on.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, PixelFormat};

const SUBJECT_LEVEL: u8 = 235;
const DEFAULT_NOISE: u8 = 4;
const DEFAULT_SEED: u64 = 0x5eed;

/// `frames` consecutive frames, with or without the subject in view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneSegment {
    pub frames: u32,
    pub occupied: bool,
}

impl SceneSegment {
    pub fn empty(frames: u32) -> Self {
        Self {
            frames,
            occupied: false,
        }
    }

    pub fn occupied(frames: u32) -> Self {
        Self {
            frames,
            occupied: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub script: Vec<SceneSegment>,
    /// Restart the script when it ends instead of ending the stream.
    pub looping: bool,
    /// Side of the subject square in pixels.
    pub subject_size: u32,
    /// Max per-pixel sensor noise (+/-).
    pub noise: u8,
    pub seed: u64,
    /// Sleep between frames to match `target_fps` in wall-clock time.
    pub pace: bool,
    /// Simulated time of the first frame; `None` uses the time of `connect`.
    pub start: Option<DateTime<Utc>>,
}

impl SyntheticConfig {
    pub fn new(width: u32, height: u32, target_fps: u32, script: Vec<SceneSegment>) -> Self {
        Self {
            url: "stub://synthetic".to_string(),
            width,
            height,
            target_fps,
            script,
            looping: false,
            subject_size: (width.min(height) / 4).max(1),
            noise: DEFAULT_NOISE,
            seed: DEFAULT_SEED,
            pace: false,
            start: None,
        }
    }

    /// Default looping scene for `stub://` URLs: 3 s empty, 6 s occupied, 3 s empty.
    pub fn for_url(url: &str, width: u32, height: u32, target_fps: u32) -> Self {
        let fps = target_fps.max(1);
        let mut cfg = Self::new(
            width,
            height,
            fps,
            vec![
                SceneSegment::empty(fps * 3),
                SceneSegment::occupied(fps * 6),
                SceneSegment::empty(fps * 3),
            ],
        );
        cfg.url = url.to_string();
        cfg.looping = true;
        cfg.pace = true;
        cfg
    }

    pub fn total_frames(&self) -> u64 {
        self.script.iter().map(|s| u64::from(s.frames)).sum()
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    background: Vec<u8>,
    rng: StdRng,
    start: Option<DateTime<Utc>>,
    frame_count: u64,
    segment: usize,
    in_segment: u32,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let background = render_background(config.width, config.height);
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            start: config.start,
            config,
            background,
            rng,
            frame_count: 0,
            segment: 0,
            in_segment: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        if self.start.is_none() {
            self.start = Some(Utc::now());
        }
        log::info!(
            "SyntheticSource: connected to {} ({}x{} @ {} fps, {} scripted frames{})",
            self.config.url,
            self.config.width,
            self.config.height,
            self.config.target_fps,
            self.config.total_frames(),
            if self.config.looping { ", looping" } else { "" }
        );
        Ok(())
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    /// Whether the scripted scene has the subject in view at the next frame.
    fn next_occupancy(&mut self) -> Option<bool> {
        loop {
            let segment = self.config.script.get(self.segment)?;
            if self.in_segment < segment.frames {
                self.in_segment += 1;
                return Some(segment.occupied);
            }
            self.segment += 1;
            self.in_segment = 0;
            if self.segment >= self.config.script.len() {
                if !self.config.looping || self.config.total_frames() == 0 {
                    return None;
                }
                self.segment = 0;
            }
        }
    }

    fn render(&mut self, occupied: bool) -> Vec<u8> {
        let (w, h) = (self.config.width as usize, self.config.height as usize);
        let mut pixels = self.background.clone();

        if self.config.noise > 0 {
            let amp = i16::from(self.config.noise);
            for byte in pixels.iter_mut() {
                let jitter = self.rng.gen_range(-amp..=amp);
                *byte = (i16::from(*byte) + jitter).clamp(0, 255) as u8;
            }
        }

        if occupied {
            let side = (self.config.subject_size as usize).min(w).min(h);
            let travel = w - side;
            let x0 = if travel == 0 {
                0
            } else {
                (self.in_segment as usize * 2) % (travel + 1)
            };
            let y0 = (h - side) / 2;
            for y in y0..y0 + side {
                let row = y * w * 3;
                for x in x0..x0 + side {
                    let offset = row + x * 3;
                    pixels[offset..offset + 3].fill(SUBJECT_LEVEL);
                }
            }
        }
        pixels
    }

    fn timestamp(&self) -> DateTime<Utc> {
        let start = self.start.unwrap_or_else(Utc::now);
        let fps = i64::from(self.config.target_fps.max(1));
        start + Duration::microseconds(self.frame_count as i64 * 1_000_000 / fps)
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(occupied) = self.next_occupancy() else {
            return Ok(None);
        };
        if self.config.pace && self.frame_count > 0 {
            let fps = u64::from(self.config.target_fps.max(1));
            std::thread::sleep(std::time::Duration::from_micros(1_000_000 / fps));
        }
        let captured_at = self.timestamp();
        let pixels = self.render(occupied);
        self.frame_count += 1;
        Frame::new(
            PixelFormat::Rgb24,
            self.config.width,
            self.config.height,
            pixels,
            captured_at,
        )
        .map(Some)
    }
}

fn render_background(width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut pixels = vec![0u8; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            // soft diagonal texture, well below the subject level
            let level = 70 + ((x / 8 + y / 8) % 4) as u8 * 6;
            let offset = (y * w + x) * 3;
            pixels[offset] = level;
            pixels[offset + 1] = level.saturating_add(4);
            pixels[offset + 2] = level.saturating_sub(4);
        }
    }
    pixels
}
