//! Monitor configuration: defaults, then the `PRESENCE_CONFIG` file, then
//! `PRESENCE_*` environment overrides, then validation.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::preprocess::MAX_BLUR_KERNEL;
use crate::detect::segmenter::{DEFAULT_DIFF_THRESHOLD, DEFAULT_DILATION_ITERATIONS, DEFAULT_MIN_AREA};
use crate::detect::{AreaThreshold, BaselinePolicy};
use crate::error::MonitorError;
use crate::presence::history::DEFAULT_HISTORY_WINDOW;

const DEFAULT_CAMERA_ID: &str = "front_door";
const DEFAULT_SOURCE_URL: &str = "stub://front_door";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_BLUR_KERNEL: u32 = 21;
const DEFAULT_DWELL_SECS: u64 = 300;
const DEFAULT_QUEUE_CAPACITY: usize = 32;
const DEFAULT_MQTT_TOPIC_PREFIX: &str = "presence";
const MAX_DILATION_ITERATIONS: u32 = 16;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    camera_id: Option<String>,
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    presence: Option<PresenceConfigFile>,
    notify: Option<NotifyConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    min_area: Option<f64>,
    min_area_fraction: Option<f64>,
    diff_threshold: Option<u32>,
    dilation_iterations: Option<u32>,
    blur_kernel: Option<u32>,
    baseline_refresh_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PresenceConfigFile {
    dwell_secs: Option<u64>,
    history_window: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    queue_capacity: Option<usize>,
    evidence_dir: Option<PathBuf>,
    annotate_evidence: Option<bool>,
    cleanup_on_exit: Option<bool>,
    mqtt: Option<MqttConfigFile>,
    webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker: Option<String>,
    topic_prefix: Option<String>,
    client_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub camera_id: String,
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub presence: PresenceSettings,
    pub notify: NotifySettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub min_area: AreaThreshold,
    pub diff_threshold: u8,
    pub dilation_iterations: u32,
    pub blur_kernel: u32,
    pub baseline_policy: BaselinePolicy,
}

#[derive(Debug, Clone)]
pub struct PresenceSettings {
    pub dwell_threshold: Duration,
    pub history_window: usize,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub queue_capacity: usize,
    pub evidence_dir: Option<PathBuf>,
    pub annotate_evidence: bool,
    pub cleanup_on_exit: bool,
    pub mqtt: Option<MqttSettings>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    /// `host:port` of the broker.
    pub broker: String,
    pub topic_prefix: String,
    pub client_id: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            target_fps: DEFAULT_SOURCE_FPS,
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_area: AreaThreshold::Absolute(DEFAULT_MIN_AREA),
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            dilation_iterations: DEFAULT_DILATION_ITERATIONS,
            blur_kernel: DEFAULT_BLUR_KERNEL,
            baseline_policy: BaselinePolicy::Static,
        }
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            dwell_threshold: Duration::from_secs(DEFAULT_DWELL_SECS),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            evidence_dir: None,
            annotate_evidence: true,
            cleanup_on_exit: true,
            mqtt: None,
            webhook_url: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            camera_id: DEFAULT_CAMERA_ID.to_string(),
            source: SourceSettings::default(),
            detection: DetectionSettings::default(),
            presence: PresenceSettings::default(),
            notify: NotifySettings::default(),
        }
    }
}

impl MonitorConfig {
    /// Defaults, then the file named by `PRESENCE_CONFIG`, then environment
    /// overrides, then validation. Every failure is a `Configuration` error.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PRESENCE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(camera_id) = file.camera_id {
            cfg.camera_id = camera_id;
        }
        if let Some(source) = file.source {
            if let Some(url) = source.url {
                cfg.source.url = url;
            }
            if let Some(fps) = source.target_fps {
                cfg.source.target_fps = fps;
            }
            if let Some(width) = source.width {
                cfg.source.width = width;
            }
            if let Some(height) = source.height {
                cfg.source.height = height;
            }
        }
        if let Some(detection) = file.detection {
            if detection.min_area.is_some() && detection.min_area_fraction.is_some() {
                return Err(MonitorError::configuration(
                    "set either detection.min_area or detection.min_area_fraction, not both",
                )
                .into());
            }
            if let Some(pixels) = detection.min_area {
                cfg.detection.min_area = AreaThreshold::Absolute(pixels);
            }
            if let Some(fraction) = detection.min_area_fraction {
                cfg.detection.min_area = AreaThreshold::FractionOfFrame(fraction);
            }
            if let Some(threshold) = detection.diff_threshold {
                cfg.detection.diff_threshold = u8::try_from(threshold).map_err(|_| {
                    MonitorError::configuration("detection.diff_threshold must be in 1..=255")
                })?;
            }
            if let Some(iterations) = detection.dilation_iterations {
                cfg.detection.dilation_iterations = iterations;
            }
            if let Some(kernel) = detection.blur_kernel {
                cfg.detection.blur_kernel = kernel;
            }
            if let Some(idle_frames) = detection.baseline_refresh_frames {
                cfg.detection.baseline_policy = BaselinePolicy::RefreshWhenIdle { idle_frames };
            }
        }
        if let Some(presence) = file.presence {
            if let Some(secs) = presence.dwell_secs {
                cfg.presence.dwell_threshold = Duration::from_secs(secs);
            }
            if let Some(window) = presence.history_window {
                cfg.presence.history_window = window;
            }
        }
        if let Some(notify) = file.notify {
            if let Some(capacity) = notify.queue_capacity {
                cfg.notify.queue_capacity = capacity;
            }
            cfg.notify.evidence_dir = notify.evidence_dir;
            if let Some(annotate) = notify.annotate_evidence {
                cfg.notify.annotate_evidence = annotate;
            }
            if let Some(cleanup) = notify.cleanup_on_exit {
                cfg.notify.cleanup_on_exit = cleanup;
            }
            cfg.notify.webhook_url = notify.webhook_url;
            if let Some(mqtt) = notify.mqtt {
                let broker = mqtt.broker.ok_or_else(|| {
                    MonitorError::configuration("notify.mqtt.broker is required when mqtt is set")
                })?;
                cfg.notify.mqtt = Some(MqttSettings {
                    broker,
                    topic_prefix: mqtt
                        .topic_prefix
                        .unwrap_or_else(|| DEFAULT_MQTT_TOPIC_PREFIX.to_string()),
                    client_id: mqtt
                        .client_id
                        .unwrap_or_else(|| format!("presence-watch-{}", cfg.camera_id.to_lowercase())),
                });
            }
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(camera_id) = non_empty_env("PRESENCE_CAMERA_ID") {
            self.camera_id = camera_id;
        }
        if let Some(url) = non_empty_env("PRESENCE_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(dwell) = non_empty_env("PRESENCE_DWELL_SECS") {
            let secs: u64 = dwell.trim().parse().map_err(|_| {
                MonitorError::configuration(
                    "PRESENCE_DWELL_SECS must be an integer number of seconds",
                )
            })?;
            self.presence.dwell_threshold = Duration::from_secs(secs);
        }
        if let Some(area) = non_empty_env("PRESENCE_MIN_AREA") {
            let pixels: f64 = area.trim().parse().map_err(|_| {
                MonitorError::configuration("PRESENCE_MIN_AREA must be a number of pixels")
            })?;
            self.detection.min_area = AreaThreshold::Absolute(pixels);
        }
        if let Some(threshold) = non_empty_env("PRESENCE_DIFF_THRESHOLD") {
            self.detection.diff_threshold = threshold.trim().parse().map_err(|_| {
                MonitorError::configuration("PRESENCE_DIFF_THRESHOLD must be in 1..=255")
            })?;
        }
        if let Some(kernel) = non_empty_env("PRESENCE_BLUR_KERNEL") {
            self.detection.blur_kernel = kernel.trim().parse().map_err(|_| {
                MonitorError::configuration("PRESENCE_BLUR_KERNEL must be an odd integer")
            })?;
        }
        if let Some(dir) = non_empty_env("PRESENCE_EVIDENCE_DIR") {
            self.notify.evidence_dir = Some(PathBuf::from(dir));
        }
        if let Some(broker) = non_empty_env("PRESENCE_MQTT_BROKER") {
            match self.notify.mqtt.as_mut() {
                Some(mqtt) => mqtt.broker = broker,
                None => {
                    self.notify.mqtt = Some(MqttSettings {
                        broker,
                        topic_prefix: DEFAULT_MQTT_TOPIC_PREFIX.to_string(),
                        client_id: format!("presence-watch-{}", self.camera_id.to_lowercase()),
                    })
                }
            }
        }
        if let Some(url) = non_empty_env("PRESENCE_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        crate::validate_camera_id(&self.camera_id)?;
        self.camera_id = self.camera_id.to_lowercase();

        if self.source.url.trim().is_empty() {
            return Err(MonitorError::configuration("source url must not be empty").into());
        }
        if self.source.target_fps == 0 {
            return Err(MonitorError::configuration("source target_fps must be >= 1").into());
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(MonitorError::configuration("source width and height must be >= 1").into());
        }

        let detection = &self.detection;
        if detection.diff_threshold == 0 {
            return Err(MonitorError::configuration("diff threshold must be in 1..=255").into());
        }
        if detection.blur_kernel == 0
            || detection.blur_kernel % 2 == 0
            || detection.blur_kernel > MAX_BLUR_KERNEL
        {
            return Err(MonitorError::configuration(format!(
                "blur kernel must be odd and in 1..={}, got {}",
                MAX_BLUR_KERNEL, detection.blur_kernel
            ))
            .into());
        }
        if detection.dilation_iterations > MAX_DILATION_ITERATIONS {
            return Err(MonitorError::configuration(format!(
                "dilation iterations must be <= {}",
                MAX_DILATION_ITERATIONS
            ))
            .into());
        }
        match detection.min_area {
            AreaThreshold::Absolute(pixels) if !pixels.is_finite() || pixels <= 0.0 => {
                return Err(MonitorError::configuration("min area must be a positive number").into());
            }
            AreaThreshold::FractionOfFrame(fraction)
                if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 =>
            {
                return Err(
                    MonitorError::configuration("min area fraction must be in (0, 1]").into(),
                );
            }
            _ => {}
        }
        if let BaselinePolicy::RefreshWhenIdle { idle_frames: 0 } = detection.baseline_policy {
            return Err(
                MonitorError::configuration("baseline refresh needs at least one idle frame").into(),
            );
        }

        if self.presence.dwell_threshold.is_zero() {
            return Err(MonitorError::configuration("dwell threshold must be greater than zero").into());
        }
        if self.presence.history_window == 0 {
            return Err(MonitorError::configuration("history window must be >= 1").into());
        }

        if self.notify.queue_capacity == 0 {
            return Err(MonitorError::configuration("notification queue capacity must be >= 1").into());
        }
        if let Some(mqtt) = &self.notify.mqtt {
            parse_broker_addr(&mqtt.broker)?;
            if mqtt.topic_prefix.trim().is_empty() {
                return Err(MonitorError::configuration("mqtt topic prefix must not be empty").into());
            }
        }
        if let Some(url) = &self.notify.webhook_url {
            validate_webhook_url(url)?;
        }
        Ok(())
    }
}

/// Split `host:port` into its parts.
pub fn parse_broker_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
        MonitorError::configuration(format!("mqtt broker '{}' must be host:port", addr))
    })?;
    let port: u16 = port.parse().map_err(|_| {
        MonitorError::configuration(format!("mqtt broker '{}' has an invalid port", addr))
    })?;
    if host.trim().is_empty() {
        return Err(MonitorError::configuration(format!("mqtt broker '{}' has no host", addr)).into());
    }
    Ok((host.to_string(), port))
}

#[cfg(feature = "notify-webhook")]
fn validate_webhook_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| MonitorError::configuration(format!("invalid webhook url {}: {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MonitorError::configuration("webhook url must be http or https").into());
    }
    Ok(())
}

#[cfg(not(feature = "notify-webhook"))]
fn validate_webhook_url(_raw: &str) -> Result<()> {
    Err(MonitorError::configuration(
        "webhook_url is set but this build lacks the notify-webhook feature",
    )
    .into())
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MonitorError::configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let parsed = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| {
        MonitorError::configuration(format!("invalid config file {}: {}", path.display(), e))
            .into()
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let mut cfg = MonitorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.detection.diff_threshold, 60);
        assert_eq!(cfg.detection.blur_kernel, 21);
        assert_eq!(cfg.detection.dilation_iterations, 2);
        assert_eq!(cfg.detection.min_area, AreaThreshold::Absolute(5000.0));
        assert_eq!(cfg.presence.dwell_threshold, Duration::from_secs(300));
    }

    #[test]
    fn broker_addr_parses() {
        assert_eq!(
            parse_broker_addr("localhost:1883").unwrap(),
            ("localhost".to_string(), 1883)
        );
        assert!(parse_broker_addr("localhost").is_err());
        assert!(parse_broker_addr(":1883").is_err());
    }

    #[test]
    fn rejects_both_area_forms() {
        let file = MonitorConfigFile {
            detection: Some(DetectionConfigFile {
                min_area: Some(100.0),
                min_area_fraction: Some(0.1),
                ..DetectionConfigFile::default()
            }),
            ..MonitorConfigFile::default()
        };
        assert!(MonitorConfig::from_file(file).is_err());
    }

    #[test]
    fn out_of_range_threshold_in_file() {
        let file = MonitorConfigFile {
            detection: Some(DetectionConfigFile {
                diff_threshold: Some(300),
                ..DetectionConfigFile::default()
            }),
            ..MonitorConfigFile::default()
        };
        let err = MonitorConfig::from_file(file).unwrap_err();
        assert!(err.to_string().contains("diff_threshold"));
    }
}
