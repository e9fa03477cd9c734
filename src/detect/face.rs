//! Face-identification adapter boundary.

use anyhow::Result;

use crate::frame::Frame;
use crate::identity::Embedding;

use super::result::BBox;

/// External face location and embedding capability consumed by the engine.
///
/// The engine uses at most the first located face per frame. Distance
/// computation against the gallery lives on [`crate::identity::Gallery`]
/// because the gallery format is owned by the core, not the backend.
pub trait FaceEngine: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Locate faces in the frame, in backend order.
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BBox>>;

    /// Compute the embedding for one located face.
    fn embed(&mut self, frame: &Frame, bbox: &BBox) -> Result<Embedding>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
