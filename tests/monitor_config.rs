use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use presence_watch::config::MonitorConfig;
use presence_watch::detect::{AreaThreshold, BaselinePolicy};
use presence_watch::MonitorError;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PRESENCE_CONFIG",
        "PRESENCE_CAMERA_ID",
        "PRESENCE_SOURCE_URL",
        "PRESENCE_DWELL_SECS",
        "PRESENCE_MIN_AREA",
        "PRESENCE_DIFF_THRESHOLD",
        "PRESENCE_BLUR_KERNEL",
        "PRESENCE_EVIDENCE_DIR",
        "PRESENCE_MQTT_BROKER",
        "PRESENCE_WEBHOOK_URL",
    ] {
        std::env::remove_var(key);
    }
}

fn is_configuration_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<MonitorError>(),
        Some(MonitorError::Configuration(_))
    )
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load defaults");
    assert_eq!(cfg.camera_id, "front_door");
    assert_eq!(cfg.source.url, "stub://front_door");
    assert_eq!(cfg.detection.min_area, AreaThreshold::Absolute(5000.0));
    assert_eq!(cfg.detection.diff_threshold, 60);
    assert_eq!(cfg.detection.dilation_iterations, 2);
    assert_eq!(cfg.detection.blur_kernel, 21);
    assert_eq!(cfg.detection.baseline_policy, BaselinePolicy::Static);
    assert_eq!(cfg.presence.dwell_threshold, Duration::from_secs(300));
    assert!(cfg.notify.mqtt.is_none());
    assert!(cfg.notify.evidence_dir.is_none());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let evidence_dir = file.path().with_extension("evidence");
    let json = format!(
        r#"{{
            "camera_id": "Loading_Bay",
            "source": {{
                "url": "stub://loading_bay",
                "target_fps": 15,
                "width": 800,
                "height": 600
            }},
            "detection": {{
                "min_area_fraction": 0.02,
                "diff_threshold": 40,
                "dilation_iterations": 3,
                "blur_kernel": 15,
                "baseline_refresh_frames": 50
            }},
            "presence": {{
                "dwell_secs": 120,
                "history_window": 32
            }},
            "notify": {{
                "queue_capacity": 8,
                "evidence_dir": "{}",
                "cleanup_on_exit": false,
                "mqtt": {{ "broker": "broker.local:1883" }}
            }}
        }}"#,
        evidence_dir.display()
    );
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PRESENCE_CONFIG", file.path());
    std::env::set_var("PRESENCE_DWELL_SECS", "45");
    std::env::set_var("PRESENCE_DIFF_THRESHOLD", "70");

    let cfg = MonitorConfig::load().expect("load config");

    assert_eq!(cfg.camera_id, "loading_bay");
    assert_eq!(cfg.source.url, "stub://loading_bay");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.source.width, 800);
    assert_eq!(cfg.source.height, 600);
    assert_eq!(cfg.detection.min_area, AreaThreshold::FractionOfFrame(0.02));
    assert_eq!(cfg.detection.diff_threshold, 70);
    assert_eq!(cfg.detection.dilation_iterations, 3);
    assert_eq!(cfg.detection.blur_kernel, 15);
    assert_eq!(
        cfg.detection.baseline_policy,
        BaselinePolicy::RefreshWhenIdle { idle_frames: 50 }
    );
    assert_eq!(cfg.presence.dwell_threshold, Duration::from_secs(45));
    assert_eq!(cfg.presence.history_window, 32);
    assert_eq!(cfg.notify.queue_capacity, 8);
    assert_eq!(cfg.notify.evidence_dir.as_deref(), Some(evidence_dir.as_path()));
    assert!(!cfg.notify.cleanup_on_exit);
    let mqtt = cfg.notify.mqtt.expect("mqtt settings");
    assert_eq!(mqtt.broker, "broker.local:1883");
    assert_eq!(mqtt.topic_prefix, "presence");
    assert_eq!(mqtt.client_id, "presence-watch-loading_bay");

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
camera_id = "garage"

[detection]
min_area = 2500.0

[presence]
dwell_secs = 30
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("PRESENCE_CONFIG", file.path());

    let cfg = MonitorConfig::load().expect("load toml config");
    assert_eq!(cfg.camera_id, "garage");
    assert_eq!(cfg.detection.min_area, AreaThreshold::Absolute(2500.0));
    assert_eq!(cfg.presence.dwell_threshold, Duration::from_secs(30));

    clear_env();
}

#[test]
fn env_creates_mqtt_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PRESENCE_MQTT_BROKER", "127.0.0.1:1883");
    std::env::set_var("PRESENCE_CAMERA_ID", "porch");
    let cfg = MonitorConfig::load().expect("load config");
    let mqtt = cfg.notify.mqtt.expect("mqtt from env");
    assert_eq!(mqtt.broker, "127.0.0.1:1883");
    assert_eq!(mqtt.client_id, "presence-watch-porch");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();

    for (key, value) in [
        ("PRESENCE_BLUR_KERNEL", "20"),
        ("PRESENCE_BLUR_KERNEL", "0"),
        ("PRESENCE_DIFF_THRESHOLD", "0"),
        ("PRESENCE_DIFF_THRESHOLD", "300"),
        ("PRESENCE_DWELL_SECS", "0"),
        ("PRESENCE_DWELL_SECS", "soon"),
        ("PRESENCE_MIN_AREA", "-5"),
        ("PRESENCE_CAMERA_ID", "front door"),
        ("PRESENCE_MQTT_BROKER", "no-port"),
    ] {
        clear_env();
        std::env::set_var(key, value);
        let err = MonitorConfig::load().expect_err(&format!("{}={} must be rejected", key, value));
        assert!(
            is_configuration_error(&err),
            "{}={} gave {:#}",
            key,
            value,
            err
        );
    }

    clear_env();
}

#[test]
fn missing_or_malformed_file_is_configuration_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PRESENCE_CONFIG", "/nonexistent/presence.json");
    let err = MonitorConfig::load().expect_err("missing file");
    assert!(is_configuration_error(&err));

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("PRESENCE_CONFIG", file.path());
    let err = MonitorConfig::load().expect_err("malformed file");
    assert!(is_configuration_error(&err));

    clear_env();
}
