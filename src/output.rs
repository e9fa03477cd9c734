//! Output surface: per-frame stream records, annotation, and emitters.
//!
//! The JSONL record mirrors the host contract this daemon replaces: one
//! JSON object per frame on stdout, with an optional base64 JPEG attached.

use std::io::{Cursor, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;

use crate::frame::Frame;
use crate::fusion::FusedResult;
use crate::identity::IdentityLabel;
use crate::motion::GateMode;

/// One line of the JSONL stream.
#[derive(Clone, Debug, Serialize)]
pub struct StreamRecord {
    pub frame: u64,
    pub mode: GateMode,
    pub object_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_bbox: Option<[i32; 4]>,
    pub person_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_bbox: Option<[i32; 4]>,
    /// Changed-pixel count from the motion gate.
    pub motion: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl StreamRecord {
    pub fn from_fused(fused: &FusedResult, motion: u32) -> Self {
        Self {
            frame: fused.seq,
            mode: fused.mode,
            object_detected: fused.object.is_some(),
            object_confidence: fused.object.as_ref().map(|o| o.confidence),
            object_bbox: fused.object.as_ref().map(|o| o.bbox.as_array()),
            person_detected: fused.face.is_some(),
            face_id: fused
                .face
                .as_ref()
                .map(|f| f.identity.to_string()),
            face_bbox: fused.face.as_ref().map(|f| f.bbox.as_array()),
            motion,
            img: None,
        }
    }

    pub fn with_image(mut self, jpeg: &[u8]) -> Self {
        self.img = Some(BASE64.encode(jpeg));
        self
    }
}

/// Draw hollow boxes for the fused detections onto a copy of the frame.
///
/// Objects are red; faces are colored by identity: enrolled green,
/// stranger red, bare presence yellow.
pub fn annotate(frame: &Frame, fused: &FusedResult) -> Result<RgbImage> {
    let mut image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .context("frame buffer does not match its dimensions")?;

    if let Some(object) = &fused.object {
        draw_bbox(&mut image, object.bbox.as_array(), Rgb([255, 0, 0]));
    }
    if let Some(face) = &fused.face {
        let color = match face.identity {
            IdentityLabel::Enrolled { .. } => Rgb([0, 255, 0]),
            IdentityLabel::Stranger { .. } => Rgb([255, 0, 0]),
            IdentityLabel::Human => Rgb([255, 255, 0]),
        };
        draw_bbox(&mut image, face.bbox.as_array(), color);
    }

    Ok(image)
}

fn draw_bbox(image: &mut RgbImage, [x1, y1, x2, y2]: [i32; 4], color: Rgb<u8>) {
    let width = (x2 - x1).max(1) as u32;
    let height = (y2 - y1).max(1) as u32;
    draw_hollow_rect_mut(image, Rect::at(x1, y1).of_size(width, height), color);
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .context("encode annotated frame as JPEG")?;
    Ok(bytes.into_inner())
}

/// Where fused results go.
pub enum Emitter {
    /// One JSON object per frame on stdout.
    Jsonl { attach_frames: bool },
    /// Latest annotated frame written to a fixed path.
    Preview { path: PathBuf },
}

impl Emitter {
    pub fn emit(&self, frame: &Frame, fused: &FusedResult, motion: u32) -> Result<()> {
        match self {
            Emitter::Jsonl { attach_frames } => {
                let mut record = StreamRecord::from_fused(fused, motion);
                if *attach_frames {
                    let jpeg = encode_jpeg(&annotate(frame, fused)?)?;
                    record = record.with_image(&jpeg);
                }
                let line = serde_json::to_string(&record).context("serialize stream record")?;
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{}", line).context("write stream record")?;
                Ok(())
            }
            Emitter::Preview { path } => {
                let jpeg = encode_jpeg(&annotate(frame, fused)?)?;
                std::fs::write(path, jpeg)
                    .with_context(|| format!("write preview frame {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, FaceHit, ObjectHit};
    use crate::fusion::FusedResult;
    use crate::motion::GateMode;

    fn fused_with_hits() -> FusedResult {
        FusedResult {
            seq: 12,
            mode: GateMode::Active,
            object: Some(ObjectHit {
                confidence: 0.72,
                bbox: BBox::new(2, 2, 20, 20),
            }),
            face: Some(FaceHit {
                bbox: BBox::new(5, 5, 12, 12),
                identity: IdentityLabel::Stranger { score: 0.4 },
            }),
        }
    }

    #[test]
    fn record_mirrors_fused_fields() {
        let record = StreamRecord::from_fused(&fused_with_hits(), 1234);
        assert_eq!(record.frame, 12);
        assert!(record.object_detected);
        assert_eq!(record.object_bbox, Some([2, 2, 20, 20]));
        assert!(record.person_detected);
        assert_eq!(record.face_id.as_deref(), Some("stranger (0.40)"));
        assert_eq!(record.motion, 1234);
        assert!(record.img.is_none());
    }

    #[test]
    fn idle_record_has_no_detections_serialized() {
        let record = StreamRecord::from_fused(&FusedResult::idle(3), 0);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"mode\":\"idle\""));
        assert!(!json.contains("object_bbox"));
        assert!(!json.contains("face_id"));
    }

    #[test]
    fn annotation_produces_encodable_image() {
        let frame = Frame::new(vec![10u8; 32 * 32 * 3], 32, 32, 12).unwrap();
        let image = annotate(&frame, &fused_with_hits()).unwrap();
        let jpeg = encode_jpeg(&image).unwrap();
        assert!(!jpeg.is_empty());

        let record = StreamRecord::from_fused(&fused_with_hits(), 0).with_image(&jpeg);
        assert!(record.img.is_some());
    }
}
