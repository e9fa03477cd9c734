//! Detection adapters and their shared result types.

pub mod backends;
pub mod face;
pub mod object;
mod result;

pub use face::FaceEngine;
pub use object::{select_target, ObjectDetector};
pub use result::{BBox, FaceHit, ObjectHit, RawDetection};
