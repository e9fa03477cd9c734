//! Per-track results, conflict resolution, and the fused output record.

use serde::Deserialize;

use crate::detect::{FaceHit, ObjectHit};
use crate::motion::GateMode;

/// Latest state of one inference track.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackResult<T> {
    /// Track has not executed since startup.
    NotRun,
    /// Track executed and found nothing.
    NotDetected,
    /// Track executed and found a target.
    Detected(T),
}

impl<T> Default for TrackResult<T> {
    fn default() -> Self {
        TrackResult::NotRun
    }
}

impl<T> TrackResult<T> {
    pub fn hit(&self) -> Option<&T> {
        match self {
            TrackResult::Detected(hit) => Some(hit),
            _ => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, TrackResult::Detected(_))
    }
}

/// How simultaneous object and face hits are reconciled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Suppress the object hit only when the face centroid falls strictly
    /// inside the object box.
    #[default]
    Geometric,
    /// Any face hit suppresses the object hit.
    FacePriority,
}

/// What the engine emits on idle frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdlePolicy {
    /// Emit a distinct idle marker carrying no detections.
    #[default]
    Marker,
    /// Repeat the most recent active result, re-stamped for the idle frame.
    HoldLastActive,
}

/// One fused per-frame output.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedResult {
    pub seq: u64,
    pub mode: GateMode,
    pub object: Option<ObjectHit>,
    pub face: Option<FaceHit>,
}

impl FusedResult {
    pub fn idle(seq: u64) -> Self {
        Self {
            seq,
            mode: GateMode::Idle,
            object: None,
            face: None,
        }
    }

    pub fn is_idle_marker(&self) -> bool {
        self.mode == GateMode::Idle && self.object.is_none() && self.face.is_none()
    }
}

/// Reconcile the two tracks' current results under a policy.
///
/// Pure function: same inputs always give the same outputs. A `NotRun`
/// or `NotDetected` track contributes nothing and never suppresses the
/// other track.
pub fn resolve(
    policy: FusionPolicy,
    object: &TrackResult<ObjectHit>,
    face: &TrackResult<FaceHit>,
) -> (Option<ObjectHit>, Option<FaceHit>) {
    let object_hit = object.hit().cloned();
    let face_hit = face.hit().cloned();

    let suppress_object = match (policy, &object_hit, &face_hit) {
        (FusionPolicy::FacePriority, Some(_), Some(_)) => true,
        (FusionPolicy::Geometric, Some(obj), Some(face)) => {
            let (cx, cy) = face.bbox.centroid();
            obj.bbox.contains_point(cx, cy)
        }
        _ => false,
    };

    if suppress_object {
        (None, face_hit)
    } else {
        (object_hit, face_hit)
    }
}
