use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use guardian_vision::config::GuardianConfig;
use guardian_vision::fusion::{FusionPolicy, IdlePolicy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "GUARDIAN_CONFIG",
        "GUARDIAN_GALLERY",
        "GUARDIAN_CAMERA",
        "GUARDIAN_OUTPUT",
        "GUARDIAN_MOTION_THRESHOLD",
        "GUARDIAN_TOLERANCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "gallery_path": "faces.json",
        "models": {
            "backend": "stub"
        },
        "detector": {
            "target_class": 17,
            "confidence_floor": 0.6
        },
        "identity": {
            "tolerance": 0.5
        },
        "motion": {
            "threshold": 2500,
            "cooldown_frames": 45
        },
        "cadence": {
            "object_interval": 3,
            "face_interval": 7
        },
        "fusion": {
            "policy": "face_priority",
            "idle": "hold_last_active"
        },
        "camera": {
            "kind": "stub",
            "width": 800,
            "height": 600,
            "target_fps": 15
        },
        "output": {
            "mode": "jsonl",
            "attach_frames": true
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("GUARDIAN_CONFIG", file.path());
    std::env::set_var("GUARDIAN_MOTION_THRESHOLD", "900");
    std::env::set_var("GUARDIAN_TOLERANCE", "0.33");

    let cfg = GuardianConfig::load().expect("load config");

    assert_eq!(cfg.gallery_path, PathBuf::from("faces.json"));
    assert_eq!(cfg.models.backend, "stub");
    assert_eq!(cfg.target_class, 17);
    assert_eq!(cfg.confidence_floor, 0.6);
    assert_eq!(cfg.tolerance, 0.33);
    assert_eq!(cfg.motion_threshold, 900);
    assert_eq!(cfg.cooldown_frames, 45);
    assert_eq!(cfg.object_interval, 3);
    assert_eq!(cfg.face_interval, 7);
    assert_eq!(cfg.fusion_policy, FusionPolicy::FacePriority);
    assert_eq!(cfg.idle_policy, IdlePolicy::HoldLastActive);
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert!(cfg.output.attach_frames);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GuardianConfig::load().expect("load defaults");

    assert_eq!(cfg.gallery_path, PathBuf::from("gallery.json"));
    assert_eq!(cfg.motion_threshold, 1000);
    assert_eq!(cfg.cooldown_frames, 30);
    assert_eq!(cfg.object_interval, 2);
    assert_eq!(cfg.face_interval, 5);
    assert_eq!(cfg.fusion_policy, FusionPolicy::Geometric);
    assert_eq!(cfg.idle_policy, IdlePolicy::Marker);
    assert_eq!(cfg.camera.kind, "stub");
    assert_eq!(cfg.output.mode, "jsonl");

    clear_env();
}

#[test]
fn invalid_settings_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "cadence": { "object_interval": 0 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("GUARDIAN_CONFIG", file.path());

    assert!(GuardianConfig::load().is_err());

    clear_env();
}
