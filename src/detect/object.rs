//! Object-detection adapter boundary.

use anyhow::Result;

use crate::frame::Frame;
use crate::fusion::TrackResult;

use super::result::{ObjectHit, RawDetection};

/// External object-detection capability consumed by the engine.
///
/// Implementations own their model session and may be stateful, hence
/// `&mut self`. A failed `detect` call affects only the current frame:
/// the engine keeps the track's cached result and carries on.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, returning all candidates in model order.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Filter a backend's detection list down to the configured target class.
///
/// The first detection in input order with a matching class and a
/// confidence above the floor wins; there is no best-of-N selection.
pub fn select_target(
    detections: &[RawDetection],
    target_class: u32,
    confidence_floor: f32,
) -> TrackResult<ObjectHit> {
    for det in detections {
        if det.class_id == target_class && det.confidence > confidence_floor {
            return TrackResult::Detected(ObjectHit {
                confidence: det.confidence,
                bbox: det.bbox,
            });
        }
    }
    TrackResult::NotDetected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BBox;

    fn det(class_id: u32, confidence: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BBox::new(0, 0, 10, 10),
        }
    }

    #[test]
    fn first_qualifying_detection_wins() {
        let dets = vec![det(0, 0.6), det(0, 0.9)];
        match select_target(&dets, 0, 0.5) {
            TrackResult::Detected(hit) => assert_eq!(hit.confidence, 0.6),
            other => panic!("expected detection, got {:?}", other),
        }
    }

    #[test]
    fn wrong_class_and_low_confidence_are_skipped() {
        let dets = vec![det(3, 0.9), det(0, 0.4), det(0, 0.7)];
        match select_target(&dets, 0, 0.5) {
            TrackResult::Detected(hit) => assert_eq!(hit.confidence, 0.7),
            other => panic!("expected detection, got {:?}", other),
        }
    }

    #[test]
    fn no_qualifier_means_not_detected() {
        let dets = vec![det(1, 0.9)];
        assert_eq!(select_target(&dets, 0, 0.5), TrackResult::NotDetected);
        assert_eq!(select_target(&[], 0, 0.5), TrackResult::NotDetected);
    }
}
