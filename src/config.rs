use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::fusion::{FusionPolicy, IdlePolicy};
use crate::motion::MotionConfig;
use crate::schedule::Cadence;

const DEFAULT_GALLERY_PATH: &str = "gallery.json";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_TARGET_CLASS: u32 = 0;
const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.5;
const DEFAULT_TOLERANCE: f32 = 0.45;
const DEFAULT_MOTION_THRESHOLD: u32 = 1000;
const DEFAULT_COOLDOWN_FRAMES: u32 = 30;
const DEFAULT_OBJECT_INTERVAL: u32 = 2;
const DEFAULT_FACE_INTERVAL: u32 = 5;
const DEFAULT_CAMERA_KIND: &str = "stub";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_OUTPUT_MODE: &str = "jsonl";
const DEFAULT_PREVIEW_PATH: &str = "preview.jpg";

#[derive(Debug, Deserialize, Default)]
struct GuardianConfigFile {
    gallery_path: Option<String>,
    models: Option<ModelConfigFile>,
    detector: Option<DetectorConfigFile>,
    identity: Option<IdentityConfigFile>,
    motion: Option<MotionConfigFile>,
    cadence: Option<CadenceConfigFile>,
    fusion: Option<FusionConfigFile>,
    camera: Option<CameraConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    object_weights: Option<PathBuf>,
    face_locator: Option<PathBuf>,
    face_embedder: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    target_class: Option<u32>,
    confidence_floor: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct IdentityConfigFile {
    tolerance: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    threshold: Option<u32>,
    cooldown_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CadenceConfigFile {
    object_interval: Option<u32>,
    face_interval: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct FusionConfigFile {
    policy: Option<FusionPolicy>,
    idle: Option<IdlePolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    kind: Option<String>,
    device_index: Option<u32>,
    sensor_id: Option<u32>,
    flip_method: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    mode: Option<String>,
    attach_frames: Option<bool>,
    preview_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub gallery_path: PathBuf,
    pub models: ModelSettings,
    pub target_class: u32,
    pub confidence_floor: f32,
    pub tolerance: f32,
    pub motion_threshold: u32,
    pub cooldown_frames: u32,
    pub object_interval: u32,
    pub face_interval: u32,
    pub fusion_policy: FusionPolicy,
    pub idle_policy: IdlePolicy,
    pub camera: CameraSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    pub object_weights: Option<PathBuf>,
    pub face_locator: Option<PathBuf>,
    pub face_embedder: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// "stub", "csi", or "usb".
    pub kind: String,
    pub device_index: u32,
    pub sensor_id: u32,
    pub flip_method: u32,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// "jsonl" or "preview".
    pub mode: String,
    pub attach_frames: bool,
    pub preview_path: PathBuf,
}

impl GuardianConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GUARDIAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GuardianConfigFile) -> Self {
        let models = ModelSettings {
            backend: file
                .models
                .as_ref()
                .and_then(|m| m.backend.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            object_weights: file.models.as_ref().and_then(|m| m.object_weights.clone()),
            face_locator: file.models.as_ref().and_then(|m| m.face_locator.clone()),
            face_embedder: file.models.as_ref().and_then(|m| m.face_embedder.clone()),
        };
        let camera = CameraSettings {
            kind: file
                .camera
                .as_ref()
                .and_then(|c| c.kind.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_KIND.to_string()),
            device_index: file.camera.as_ref().and_then(|c| c.device_index).unwrap_or(0),
            sensor_id: file.camera.as_ref().and_then(|c| c.sensor_id).unwrap_or(0),
            flip_method: file.camera.as_ref().and_then(|c| c.flip_method).unwrap_or(0),
            width: file
                .camera
                .as_ref()
                .and_then(|c| c.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|c| c.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|c| c.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
        };
        let output = OutputSettings {
            mode: file
                .output
                .as_ref()
                .and_then(|o| o.mode.clone())
                .unwrap_or_else(|| DEFAULT_OUTPUT_MODE.to_string()),
            attach_frames: file
                .output
                .as_ref()
                .and_then(|o| o.attach_frames)
                .unwrap_or(false),
            preview_path: file
                .output
                .as_ref()
                .and_then(|o| o.preview_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PREVIEW_PATH)),
        };
        Self {
            gallery_path: file
                .gallery_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GALLERY_PATH)),
            models,
            target_class: file
                .detector
                .as_ref()
                .and_then(|d| d.target_class)
                .unwrap_or(DEFAULT_TARGET_CLASS),
            confidence_floor: file
                .detector
                .as_ref()
                .and_then(|d| d.confidence_floor)
                .unwrap_or(DEFAULT_CONFIDENCE_FLOOR),
            tolerance: file
                .identity
                .as_ref()
                .and_then(|i| i.tolerance)
                .unwrap_or(DEFAULT_TOLERANCE),
            motion_threshold: file
                .motion
                .as_ref()
                .and_then(|m| m.threshold)
                .unwrap_or(DEFAULT_MOTION_THRESHOLD),
            cooldown_frames: file
                .motion
                .as_ref()
                .and_then(|m| m.cooldown_frames)
                .unwrap_or(DEFAULT_COOLDOWN_FRAMES),
            object_interval: file
                .cadence
                .as_ref()
                .and_then(|c| c.object_interval)
                .unwrap_or(DEFAULT_OBJECT_INTERVAL),
            face_interval: file
                .cadence
                .as_ref()
                .and_then(|c| c.face_interval)
                .unwrap_or(DEFAULT_FACE_INTERVAL),
            fusion_policy: file
                .fusion
                .as_ref()
                .and_then(|f| f.policy)
                .unwrap_or_default(),
            idle_policy: file.fusion.as_ref().and_then(|f| f.idle).unwrap_or_default(),
            camera,
            output,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("GUARDIAN_GALLERY") {
            if !path.trim().is_empty() {
                self.gallery_path = PathBuf::from(path);
            }
        }
        if let Ok(kind) = std::env::var("GUARDIAN_CAMERA") {
            if !kind.trim().is_empty() {
                self.camera.kind = kind;
            }
        }
        if let Ok(mode) = std::env::var("GUARDIAN_OUTPUT") {
            if !mode.trim().is_empty() {
                self.output.mode = mode;
            }
        }
        if let Ok(threshold) = std::env::var("GUARDIAN_MOTION_THRESHOLD") {
            self.motion_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("GUARDIAN_MOTION_THRESHOLD must be an integer pixel count"))?;
        }
        if let Ok(tolerance) = std::env::var("GUARDIAN_TOLERANCE") {
            self.tolerance = tolerance
                .parse()
                .map_err(|_| anyhow!("GUARDIAN_TOLERANCE must be a decimal distance"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.object_interval == 0 || self.face_interval == 0 {
            return Err(anyhow!("cadence intervals must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.confidence_floor) {
            return Err(anyhow!("confidence_floor must be in [0, 1)"));
        }
        if self.tolerance <= 0.0 {
            return Err(anyhow!("tolerance must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be nonzero"));
        }
        match self.camera.kind.as_str() {
            "stub" | "csi" | "usb" => {}
            other => return Err(anyhow!("unknown camera kind '{}'", other)),
        }
        match self.output.mode.as_str() {
            "jsonl" | "preview" => {}
            other => return Err(anyhow!("unknown output mode '{}'", other)),
        }
        Ok(())
    }

    /// Engine tunables derived from the validated config.
    pub fn engine_config(&self) -> Result<crate::engine::EngineConfig> {
        Ok(crate::engine::EngineConfig {
            motion: MotionConfig {
                threshold: self.motion_threshold,
                cooldown_frames: self.cooldown_frames,
            },
            object_cadence: Cadence::new(self.object_interval)?,
            face_cadence: Cadence::new(self.face_interval)?,
            target_class: self.target_class,
            confidence_floor: self.confidence_floor,
            tolerance: self.tolerance,
            fusion_policy: self.fusion_policy,
            idle_policy: self.idle_policy,
        })
    }
}

fn read_config_file(path: &Path) -> Result<GuardianConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
