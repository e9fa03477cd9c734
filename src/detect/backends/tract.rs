#![cfg(feature = "backend-tract")]

//! ONNX inference backends built on tract.
//!
//! Models are loaded from local files; no network I/O. The object model is
//! expected to emit post-NMS rows of `[x1, y1, x2, y2, confidence, class]`,
//! the face locator rows of `[x1, y1, x2, y2, confidence]`, and the face
//! embedder a single fixed-width float vector.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::face::FaceEngine;
use crate::detect::object::ObjectDetector;
use crate::detect::result::{BBox, RawDetection};
use crate::frame::Frame;
use crate::identity::{Embedding, EMBEDDING_DIM};

/// Minimum locator confidence for a face candidate.
const FACE_LOCATOR_FLOOR: f32 = 0.5;

/// Side length of the square crop fed to the embedder.
const EMBED_INPUT_SIDE: usize = 112;

fn load_model(
    model_path: &Path,
    input_shape: (usize, usize, usize, usize),
) -> Result<TypedRunnableModel<TypedModel>> {
    let (n, c, h, w) = input_shape;
    tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(n, c, h, w)),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

/// NCHW float tensor from a frame, scaled to `[0, 1]`.
fn frame_tensor(frame: &Frame, width: u32, height: u32) -> Result<Tensor> {
    if frame.width != width || frame.height != height {
        return Err(anyhow!(
            "frame size {}x{} does not match model input {}x{}",
            frame.width,
            frame.height,
            width,
            height
        ));
    }

    let pixels = frame.pixels();
    let width = width as usize;
    let input = tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width),
        |(_, channel, y, x)| {
            let idx = (y * width + x) * 3 + channel;
            pixels[idx] as f32 / 255.0
        },
    );
    Ok(input.into_tensor())
}

fn output_rows(outputs: &TVec<TValue>, row_width: usize) -> Result<Vec<Vec<f32>>> {
    let output = outputs
        .first()
        .ok_or_else(|| anyhow!("model produced no outputs"))?;
    let view = output
        .to_array_view::<f32>()
        .context("model output tensor was not f32")?;
    let flat: Vec<f32> = view.iter().cloned().collect();
    if flat.len() % row_width != 0 {
        return Err(anyhow!(
            "model output length {} is not a multiple of row width {}",
            flat.len(),
            row_width
        ));
    }
    Ok(flat.chunks_exact(row_width).map(|c| c.to_vec()).collect())
}

pub struct TractObjectDetector {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractObjectDetector {
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model = load_model(
            model_path.as_ref(),
            (1, 3, height as usize, width as usize),
        )?;
        Ok(Self {
            model,
            width,
            height,
        })
    }
}

impl ObjectDetector for TractObjectDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = frame_tensor(frame, self.width, self.height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("object inference failed")?;

        let mut detections = Vec::new();
        for row in output_rows(&outputs, 6)? {
            detections.push(RawDetection {
                class_id: row[5] as u32,
                confidence: row[4],
                bbox: BBox::new(row[0] as i32, row[1] as i32, row[2] as i32, row[3] as i32),
            });
        }
        Ok(detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::new(
            vec![0u8; self.width as usize * self.height as usize * 3],
            self.width,
            self.height,
            0,
        )?;
        self.detect(&blank).map(|_| ())
    }
}

pub struct TractFaceEngine {
    locator: TypedRunnableModel<TypedModel>,
    embedder: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractFaceEngine {
    pub fn new<P: AsRef<Path>>(
        locator_path: P,
        embedder_path: P,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let locator = load_model(
            locator_path.as_ref(),
            (1, 3, height as usize, width as usize),
        )?;
        let embedder = load_model(
            embedder_path.as_ref(),
            (1, 3, EMBED_INPUT_SIDE, EMBED_INPUT_SIDE),
        )?;
        Ok(Self {
            locator,
            embedder,
            width,
            height,
        })
    }

    /// Nearest-neighbor crop of the box, resized to the embedder input.
    fn crop_tensor(&self, frame: &Frame, bbox: &BBox) -> Result<Tensor> {
        let x1 = bbox.x1.clamp(0, frame.width as i32 - 1) as usize;
        let y1 = bbox.y1.clamp(0, frame.height as i32 - 1) as usize;
        let x2 = bbox.x2.clamp(x1 as i32 + 1, frame.width as i32) as usize;
        let y2 = bbox.y2.clamp(y1 as i32 + 1, frame.height as i32) as usize;
        let (crop_w, crop_h) = (x2 - x1, y2 - y1);

        let pixels = frame.pixels();
        let frame_w = frame.width as usize;
        let side = EMBED_INPUT_SIDE;
        let input =
            tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
                let src_x = x1 + x * crop_w / side;
                let src_y = y1 + y * crop_h / side;
                let idx = (src_y * frame_w + src_x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            });
        Ok(input.into_tensor())
    }
}

impl FaceEngine for TractFaceEngine {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn locate(&mut self, frame: &Frame) -> Result<Vec<BBox>> {
        let input = frame_tensor(frame, self.width, self.height)?;
        let outputs = self
            .locator
            .run(tvec!(input.into()))
            .context("face location inference failed")?;

        let mut boxes = Vec::new();
        for row in output_rows(&outputs, 5)? {
            if row[4] > FACE_LOCATOR_FLOOR {
                boxes.push(BBox::new(
                    row[0] as i32,
                    row[1] as i32,
                    row[2] as i32,
                    row[3] as i32,
                ));
            }
        }
        Ok(boxes)
    }

    fn embed(&mut self, frame: &Frame, bbox: &BBox) -> Result<Embedding> {
        let input = self.crop_tensor(frame, bbox)?;
        let outputs = self
            .embedder
            .run(tvec!(input.into()))
            .context("face embedding inference failed")?;

        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("embedder produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("embedder output tensor was not f32")?;
        let values: Vec<f32> = view.iter().cloned().collect();
        if values.len() != EMBEDDING_DIM {
            return Err(anyhow!(
                "embedder produced {} components, expected {}",
                values.len(),
                EMBEDDING_DIM
            ));
        }
        Embedding::new(values)
    }
}
