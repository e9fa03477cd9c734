//! Stub backends for tests and source-less operation.
//!
//! Scripted variants replay fixed detection outputs; the change-driven
//! object variant hashes pixels and reports a frame-wide hit whenever the
//! content changed, which is enough to drive the daemon without model
//! weights.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::detect::face::FaceEngine;
use crate::detect::object::ObjectDetector;
use crate::detect::result::{BBox, RawDetection};
use crate::frame::Frame;
use crate::identity::Embedding;

enum ObjectPlan {
    /// Never detects anything.
    Quiet,
    /// Same detection list on every call.
    Fixed(Vec<RawDetection>),
    /// One list per call, then empty.
    Script(VecDeque<Vec<RawDetection>>),
    /// Detect the whole frame whenever pixel content changed.
    OnChange { last_hash: Option<[u8; 32]> },
    /// Every call errors.
    Fail,
}

pub struct StubObjectDetector {
    plan: ObjectPlan,
    calls: Arc<AtomicU64>,
}

impl StubObjectDetector {
    pub fn quiet() -> Self {
        Self::with_plan(ObjectPlan::Quiet)
    }

    pub fn fixed(detections: Vec<RawDetection>) -> Self {
        Self::with_plan(ObjectPlan::Fixed(detections))
    }

    pub fn scripted(steps: Vec<Vec<RawDetection>>) -> Self {
        Self::with_plan(ObjectPlan::Script(steps.into()))
    }

    pub fn on_change() -> Self {
        Self::with_plan(ObjectPlan::OnChange { last_hash: None })
    }

    pub fn failing() -> Self {
        Self::with_plan(ObjectPlan::Fail)
    }

    fn with_plan(plan: ObjectPlan) -> Self {
        Self {
            plan,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared invocation counter, for asserting gating/cadence behavior.
    pub fn call_counter(&self) -> Arc<AtomicU64> {
        self.calls.clone()
    }
}

impl ObjectDetector for StubObjectDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &mut self.plan {
            ObjectPlan::Quiet => Ok(Vec::new()),
            ObjectPlan::Fixed(dets) => Ok(dets.clone()),
            ObjectPlan::Script(steps) => Ok(steps.pop_front().unwrap_or_default()),
            ObjectPlan::OnChange { last_hash } => {
                let current: [u8; 32] = Sha256::digest(frame.pixels()).into();
                let changed = last_hash.is_some_and(|prev| prev != current);
                *last_hash = Some(current);
                if changed {
                    Ok(vec![RawDetection {
                        class_id: 0,
                        confidence: 0.85,
                        bbox: BBox::new(0, 0, frame.width as i32, frame.height as i32),
                    }])
                } else {
                    Ok(Vec::new())
                }
            }
            ObjectPlan::Fail => Err(anyhow!("stub object detector configured to fail")),
        }
    }
}

enum FacePlan {
    /// Never locates a face.
    Quiet,
    /// Same box and embedding on every call.
    Fixed { bbox: BBox, embedding: Embedding },
    /// One location list per call, then empty; all embeds share one vector.
    Script {
        steps: VecDeque<Vec<BBox>>,
        embedding: Embedding,
    },
    /// Every call errors.
    Fail,
}

pub struct StubFaceEngine {
    plan: FacePlan,
    locate_calls: Arc<AtomicU64>,
    embed_calls: Arc<AtomicU64>,
}

impl StubFaceEngine {
    pub fn quiet() -> Self {
        Self::with_plan(FacePlan::Quiet)
    }

    pub fn fixed(bbox: BBox, embedding: Embedding) -> Self {
        Self::with_plan(FacePlan::Fixed { bbox, embedding })
    }

    pub fn scripted(steps: Vec<Vec<BBox>>, embedding: Embedding) -> Self {
        Self::with_plan(FacePlan::Script {
            steps: steps.into(),
            embedding,
        })
    }

    pub fn failing() -> Self {
        Self::with_plan(FacePlan::Fail)
    }

    fn with_plan(plan: FacePlan) -> Self {
        Self {
            plan,
            locate_calls: Arc::new(AtomicU64::new(0)),
            embed_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn locate_counter(&self) -> Arc<AtomicU64> {
        self.locate_calls.clone()
    }

    pub fn embed_counter(&self) -> Arc<AtomicU64> {
        self.embed_calls.clone()
    }
}

impl FaceEngine for StubFaceEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn locate(&mut self, _frame: &Frame) -> Result<Vec<BBox>> {
        self.locate_calls.fetch_add(1, Ordering::SeqCst);
        match &mut self.plan {
            FacePlan::Quiet => Ok(Vec::new()),
            FacePlan::Fixed { bbox, .. } => Ok(vec![*bbox]),
            FacePlan::Script { steps, .. } => Ok(steps.pop_front().unwrap_or_default()),
            FacePlan::Fail => Err(anyhow!("stub face engine configured to fail")),
        }
    }

    fn embed(&mut self, _frame: &Frame, _bbox: &BBox) -> Result<Embedding> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        match &self.plan {
            FacePlan::Fixed { embedding, .. } | FacePlan::Script { embedding, .. } => {
                Ok(embedding.clone())
            }
            FacePlan::Quiet => Err(anyhow!("stub face engine located no face to embed")),
            FacePlan::Fail => Err(anyhow!("stub face engine configured to fail")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: u8) -> Frame {
        Frame::new(vec![level; 12], 2, 2, 1).unwrap()
    }

    #[test]
    fn on_change_detects_only_changed_frames() {
        let mut detector = StubObjectDetector::on_change();

        // First frame seeds the hash only.
        assert!(detector.detect(&frame(1)).unwrap().is_empty());
        assert_eq!(detector.detect(&frame(2)).unwrap().len(), 1);
        assert!(detector.detect(&frame(2)).unwrap().is_empty());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn script_drains_then_reports_nothing() {
        let steps = vec![vec![RawDetection {
            class_id: 0,
            confidence: 0.9,
            bbox: BBox::new(0, 0, 2, 2),
        }]];
        let mut detector = StubObjectDetector::scripted(steps);
        assert_eq!(detector.detect(&frame(0)).unwrap().len(), 1);
        assert!(detector.detect(&frame(0)).unwrap().is_empty());
    }
}
