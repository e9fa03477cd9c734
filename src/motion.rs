//! Motion gate: the ACTIVE/IDLE hysteresis state machine.
//!
//! Each frame is reduced to a denoised luma plane and differenced against
//! the previous one. The count of changed pixels (after thresholding and
//! dilation) is the motion magnitude; crossing the configured threshold
//! resets a cooldown counter that keeps the gate ACTIVE for a grace period
//! after the last observed motion.

use serde::Serialize;

use crate::frame::Frame;

/// Binary cut applied to the per-pixel absolute difference.
const DIFF_CUT: u8 = 25;

/// Box blur radius used to suppress sensor noise before differencing.
const BLUR_RADIUS: usize = 10;

/// Number of 3x3 dilation passes that merge fragmented change regions.
const DILATE_PASSES: usize = 2;

/// Gate mode for one processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    Active,
    Idle,
}

#[derive(Clone, Debug)]
pub struct MotionConfig {
    /// Minimum changed-pixel count treated as observed motion.
    pub threshold: u32,
    /// Frames the gate stays active after the last observed motion.
    pub cooldown_frames: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: 1000,
            cooldown_frames: 30,
        }
    }
}

/// Frame-difference motion gate.
///
/// Owns the previous denoised luma buffer and the cooldown counter; both
/// are mutated exactly once per frame by [`MotionGate::update`].
pub struct MotionGate {
    config: MotionConfig,
    prev_luma: Option<Vec<u8>>,
    cooldown: u32,
    last_magnitude: u32,
}

impl MotionGate {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            prev_luma: None,
            cooldown: 0,
            last_magnitude: 0,
        }
    }

    /// Feed one frame and decide the gate mode for it.
    ///
    /// The first frame has no reference buffer and is treated as no-motion;
    /// it only seeds the reference. A mid-stream resolution change resets
    /// the reference the same way.
    pub fn update(&mut self, frame: &Frame) -> GateMode {
        let denoised = box_blur(
            &frame.to_luma(),
            frame.width as usize,
            frame.height as usize,
            BLUR_RADIUS,
        );

        let magnitude = match self.prev_luma.as_deref() {
            Some(prev) if prev.len() == denoised.len() => change_magnitude(
                prev,
                &denoised,
                frame.width as usize,
                frame.height as usize,
            ),
            _ => 0,
        };

        self.prev_luma = Some(denoised);
        self.last_magnitude = magnitude;

        if magnitude > self.config.threshold {
            self.cooldown = self.config.cooldown_frames;
        }

        if self.cooldown > 0 {
            self.cooldown -= 1;
            GateMode::Active
        } else {
            GateMode::Idle
        }
    }

    /// Changed-pixel count of the most recent frame (for the HUD/stream record).
    pub fn last_magnitude(&self) -> u32 {
        self.last_magnitude
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown
    }
}

/// Count surviving pixels after thresholding and dilating the difference
/// between two equally sized luma planes.
fn change_magnitude(prev: &[u8], current: &[u8], width: usize, height: usize) -> u32 {
    let mut mask: Vec<u8> = prev
        .iter()
        .zip(current)
        .map(|(&a, &b)| u8::from(a.abs_diff(b) > DIFF_CUT))
        .collect();

    for _ in 0..DILATE_PASSES {
        mask = dilate3x3(&mask, width, height);
    }

    mask.iter().map(|&m| m as u32).sum()
}

/// Separable box blur with edge-clamped windows, O(n) via prefix sums.
fn box_blur(src: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 || width == 0 || height == 0 {
        return src.to_vec();
    }

    let mut horiz = vec![0u8; src.len()];
    let mut prefix = vec![0u32; width.max(height) + 1];

    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for (i, &v) in row.iter().enumerate() {
            prefix[i + 1] = prefix[i] + v as u32;
        }
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius + 1).min(width);
            let sum = prefix[hi] - prefix[lo];
            horiz[y * width + x] = (sum / (hi - lo) as u32) as u8;
        }
    }

    let mut out = vec![0u8; src.len()];
    for x in 0..width {
        for y in 0..height {
            prefix[y + 1] = prefix[y] + horiz[y * width + x] as u32;
        }
        for y in 0..height {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius + 1).min(height);
            let sum = prefix[hi] - prefix[lo];
            out[y * width + x] = (sum / (hi - lo) as u32) as u8;
        }
    }

    out
}

/// One binary dilation pass with a 3x3 structuring element.
fn dilate3x3(mask: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; mask.len()];
    for y in 0..height {
        for x in 0..width {
            let mut hit = 0u8;
            'scan: for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    if mask[ny * width + nx] != 0 {
                        hit = 1;
                        break 'scan;
                    }
                }
            }
            out[y * width + x] = hit;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const W: u32 = 64;
    const H: u32 = 64;

    fn flat_frame(level: u8, seq: u64) -> Frame {
        Frame::new(vec![level; (W * H * 3) as usize], W, H, seq).unwrap()
    }

    /// Black frame with a bright square covering most of the image.
    fn flash_frame(seq: u64) -> Frame {
        let mut pixels = vec![0u8; (W * H * 3) as usize];
        for y in 8..56usize {
            for x in 8..56usize {
                let idx = (y * W as usize + x) * 3;
                pixels[idx] = 255;
                pixels[idx + 1] = 255;
                pixels[idx + 2] = 255;
            }
        }
        Frame::new(pixels, W, H, seq).unwrap()
    }

    #[test]
    fn first_frame_is_no_motion() {
        let mut gate = MotionGate::new(MotionConfig {
            threshold: 0,
            cooldown_frames: 30,
        });
        assert_eq!(gate.update(&flash_frame(1)), GateMode::Idle);
        assert_eq!(gate.last_magnitude(), 0);
    }

    #[test]
    fn static_sequence_stays_idle() {
        let mut gate = MotionGate::new(MotionConfig::default());
        for seq in 1..=20 {
            assert_eq!(gate.update(&flat_frame(40, seq)), GateMode::Idle);
        }
        assert_eq!(gate.last_magnitude(), 0);
    }

    #[test]
    fn cooldown_holds_for_exactly_the_configured_length() -> Result<()> {
        let mut gate = MotionGate::new(MotionConfig {
            threshold: 1000,
            cooldown_frames: 30,
        });

        let mut modes = Vec::new();
        for seq in 1..=60u64 {
            let frame = if seq < 10 {
                flat_frame(0, seq)
            } else {
                // Scene changes at frame 10 and then stays: one delta event.
                flash_frame(seq)
            };
            modes.push(gate.update(&frame));
        }

        for (i, mode) in modes.iter().enumerate() {
            let seq = i as u64 + 1;
            let expected = if (10..=39).contains(&seq) {
                GateMode::Active
            } else {
                GateMode::Idle
            };
            assert_eq!(*mode, expected, "frame {}", seq);
        }
        Ok(())
    }

    #[test]
    fn raising_the_threshold_never_adds_active_frames() {
        // Deterministic sequence with deltas of varying size.
        let frames: Vec<Frame> = (1..=40u64)
            .map(|seq| {
                if seq % 7 == 0 {
                    flash_frame(seq)
                } else {
                    flat_frame((seq % 3 * 20) as u8, seq)
                }
            })
            .collect();

        let active_count = |threshold: u32| {
            let mut gate = MotionGate::new(MotionConfig {
                threshold,
                cooldown_frames: 5,
            });
            frames
                .iter()
                .filter(|f| gate.update(f) == GateMode::Active)
                .count()
        };

        let mut prev = usize::MAX;
        for threshold in [0, 100, 1000, 4000, u32::MAX] {
            let count = active_count(threshold);
            assert!(count <= prev, "threshold {} grew active frames", threshold);
            prev = count;
        }
    }
}
