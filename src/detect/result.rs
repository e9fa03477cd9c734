//! Detection geometry and per-track hit payloads.

use serde::{Deserialize, Serialize};

use crate::identity::IdentityLabel;

/// Axis-aligned box in pixel coordinates, corner form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn centroid(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// Strict interior containment, matching the resolver's suppression rule.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.x1 < x && x < self.x2 && self.y1 < y && y < self.y2
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// One detection as produced by an object-detection backend, before
/// target-class filtering.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Object-track hit that survived target filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectHit {
    pub confidence: f32,
    pub bbox: BBox,
}

/// Face-track hit with its resolved identity.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceHit {
    pub bbox: BBox,
    pub identity: IdentityLabel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_containment_is_strict() {
        let bbox = BBox::new(10, 10, 30, 30);
        assert_eq!(bbox.centroid(), (20, 20));
        assert!(bbox.contains_point(20, 20));
        assert!(!bbox.contains_point(10, 20), "edge is outside");
        assert!(!bbox.contains_point(40, 20));
    }
}
