//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - Synthetic scripted scenes (`stub://`, testing and demos)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! All sources produce `Frame` instances, one at a time, in capture order.
//! The ingestion layer is responsible for:
//! - Stamping each frame with its capture time
//! - Normalizing device pixel layouts into RGB24 or Gray8
//! - Reporting end of stream as `Ok(None)` and acquisition failures as errors
//!
//! The ingestion layer MUST NOT:
//! - Skip or reorder frames
//! - Retain frames after handing them to the caller

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::config::SourceSettings;
use crate::error::MonitorError;
use crate::frame::Frame;

pub use synthetic::{SceneSegment, SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Anything that yields frames in order.
pub trait FrameSource {
    /// Next frame, `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Source selected from a configured URL.
pub struct VideoSource {
    backend: SourceBackend,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Source),
}

impl VideoSource {
    pub fn open(settings: &SourceSettings) -> Result<Self> {
        if settings.url.starts_with("stub://") {
            let config = SyntheticConfig::for_url(
                &settings.url,
                settings.width,
                settings.height,
                settings.target_fps,
            );
            return Ok(Self {
                backend: SourceBackend::Synthetic(SyntheticSource::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        if let Some(device) = device_path(&settings.url) {
            return Ok(Self {
                backend: SourceBackend::Device(V4l2Source::new(V4l2Config {
                    device,
                    target_fps: settings.target_fps,
                    width: settings.width,
                    height: settings.height,
                })),
            });
        }
        Err(MonitorError::configuration(format!(
            "unsupported source url '{}' (expected stub://<name>{})",
            settings.url,
            if cfg!(feature = "ingest-v4l2") {
                " or /dev/videoN"
            } else {
                ""
            }
        ))
        .into())
    }

    pub fn connect(&mut self) -> Result<()> {
        let result = match &mut self.backend {
            SourceBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Device(source) => source.connect(),
        };
        result.map_err(|err| MonitorError::Acquisition(format!("{:#}", err)).into())
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Device(source) => source.stats(),
        }
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            SourceBackend::Device(source) => source.is_healthy(),
        }
    }
}

#[cfg(feature = "ingest-v4l2")]
fn device_path(url: &str) -> Option<String> {
    if let Some(path) = url.strip_prefix("v4l2://") {
        return Some(path.to_string());
    }
    url.starts_with("/dev/video").then(|| url.to_string())
}
