//! Per-frame orchestration: gate, schedule, run or reuse, resolve.
//!
//! The engine owns the motion gate, both inference tracks with their
//! cached results, and the conflict resolver. `process_frame` is
//! infallible: backend errors are logged and the affected track keeps
//! its cached result for the frame.

use crate::detect::{select_target, FaceEngine, FaceHit, ObjectDetector, ObjectHit};
use crate::frame::Frame;
use crate::fusion::{resolve, FusedResult, FusionPolicy, IdlePolicy, TrackResult};
use crate::identity::{classify, Gallery};
use crate::motion::{GateMode, MotionConfig, MotionGate};
use crate::schedule::{Cadence, Decision};

/// Tunables for one engine instance.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub motion: MotionConfig,
    pub object_cadence: Cadence,
    pub face_cadence: Cadence,
    /// Class id the object track reports on.
    pub target_class: u32,
    /// Minimum confidence for an object hit, exclusive.
    pub confidence_floor: f32,
    /// Maximum gallery distance for an enrolled match, exclusive.
    pub tolerance: f32,
    pub fusion_policy: FusionPolicy,
    pub idle_policy: IdlePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            motion: MotionConfig::default(),
            object_cadence: Cadence::default_object(),
            face_cadence: Cadence::default_face(),
            target_class: 0,
            confidence_floor: 0.5,
            tolerance: 0.45,
            fusion_policy: FusionPolicy::default(),
            idle_policy: IdlePolicy::default(),
        }
    }
}

#[derive(Default)]
struct ResultCache {
    object: TrackResult<ObjectHit>,
    face: TrackResult<FaceHit>,
    last_active: Option<FusedResult>,
}

pub struct Engine {
    config: EngineConfig,
    gate: MotionGate,
    object: Box<dyn ObjectDetector>,
    face: Box<dyn FaceEngine>,
    gallery: Gallery,
    cache: ResultCache,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        object: Box<dyn ObjectDetector>,
        face: Box<dyn FaceEngine>,
        gallery: Gallery,
    ) -> Self {
        let gate = MotionGate::new(config.motion.clone());
        Self {
            config,
            gate,
            object,
            face,
            gallery,
            cache: ResultCache::default(),
        }
    }

    /// Run one frame through the full pipeline.
    pub fn process_frame(&mut self, frame: &Frame) -> FusedResult {
        match self.gate.update(frame) {
            GateMode::Idle => self.idle_output(frame.seq),
            GateMode::Active => self.active_output(frame),
        }
    }

    fn idle_output(&self, seq: u64) -> FusedResult {
        match self.config.idle_policy {
            IdlePolicy::Marker => FusedResult::idle(seq),
            IdlePolicy::HoldLastActive => match &self.cache.last_active {
                Some(last) => {
                    let mut held = last.clone();
                    held.seq = seq;
                    held.mode = GateMode::Idle;
                    held
                }
                None => FusedResult::idle(seq),
            },
        }
    }

    fn active_output(&mut self, frame: &Frame) -> FusedResult {
        if self.config.object_cadence.decide(frame.seq) == Decision::Run {
            match self.object.detect(frame) {
                Ok(detections) => {
                    self.cache.object = select_target(
                        &detections,
                        self.config.target_class,
                        self.config.confidence_floor,
                    );
                }
                Err(err) => {
                    log::warn!("object track failed on frame {}: {:#}", frame.seq, err);
                }
            }
        }

        if self.config.face_cadence.decide(frame.seq) == Decision::Run {
            match self.run_face_track(frame) {
                Ok(result) => self.cache.face = result,
                Err(err) => {
                    log::warn!("face track failed on frame {}: {:#}", frame.seq, err);
                }
            }
        }

        let (object, face) = resolve(
            self.config.fusion_policy,
            &self.cache.object,
            &self.cache.face,
        );
        let fused = FusedResult {
            seq: frame.seq,
            mode: GateMode::Active,
            object,
            face,
        };
        self.cache.last_active = Some(fused.clone());
        fused
    }

    fn run_face_track(&mut self, frame: &Frame) -> anyhow::Result<TrackResult<FaceHit>> {
        let locations = self.face.locate(frame)?;
        let bbox = match locations.first() {
            Some(bbox) => *bbox,
            None => return Ok(TrackResult::NotDetected),
        };
        let embedding = self.face.embed(frame, &bbox)?;
        let identity = classify(&self.gallery, &embedding, self.config.tolerance);
        Ok(TrackResult::Detected(FaceHit { bbox, identity }))
    }

    /// Changed-pixel count of the most recent gate evaluation.
    pub fn last_magnitude(&self) -> u32 {
        self.gate.last_magnitude()
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }
}
