//! Frame buffer type shared by capture, gating, and inference.

use anyhow::{anyhow, Result};

/// Immutable RGB24 frame with a monotonically increasing sequence index.
///
/// Frames are produced by the capture layer and borrowed read-only by the
/// engine for exactly one processing step. The sequence index starts at 1
/// and never repeats within a capture session.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub seq: u64,
}

impl Frame {
    /// Wrap an RGB24 buffer. Fails when the buffer length does not match
    /// the declared dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, seq: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            seq,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Single-channel intensity plane using integer Rec.601 weights.
    pub fn to_luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(3)
            .map(|px| {
                let r = px[0] as u32;
                let g = px[1] as u32;
                let b = px[2] as u32;
                ((299 * r + 587 * g + 114 * b) / 1000) as u8
            })
            .collect()
    }
}
