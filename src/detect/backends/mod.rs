//! Concrete detector and face-engine backends.

pub mod stub;
#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{StubFaceEngine, StubObjectDetector};
#[cfg(feature = "backend-tract")]
pub use tract::{TractFaceEngine, TractObjectDetector};
