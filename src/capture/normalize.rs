//! Pixel format normalization for V4L2 capture buffers.

use anyhow::{bail, Result};

/// Source pixel layouts the USB path accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureFormat {
    Rgb24,
    Yuyv,
}

/// Convert a capture buffer into tightly packed RGB24.
pub fn to_rgb24(data: &[u8], width: u32, height: u32, format: CaptureFormat) -> Result<Vec<u8>> {
    match format {
        CaptureFormat::Rgb24 => {
            let expected = (width as usize) * (height as usize) * 3;
            if data.len() < expected {
                bail!(
                    "RGB24 buffer has {} bytes, expected at least {}",
                    data.len(),
                    expected
                );
            }
            Ok(data[..expected].to_vec())
        }
        CaptureFormat::Yuyv => yuyv_to_rgb24(data, width, height),
    }
}

/// YUYV 4:2:2 to RGB24 using integer BT.601 coefficients.
fn yuyv_to_rgb24(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let pixel_count = (width as usize) * (height as usize);
    let expected = pixel_count * 2;
    if data.len() < expected {
        bail!(
            "YUYV buffer has {} bytes, expected at least {}",
            data.len(),
            expected
        );
    }

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as i32;
        let u = chunk[1] as i32 - 128;
        let y1 = chunk[2] as i32;
        let v = chunk[3] as i32 - 128;

        for y in [y0, y1] {
            let c = (y - 16).max(0) * 298;
            let r = (c + 409 * v + 128) >> 8;
            let g = (c - 100 * u - 208 * v + 128) >> 8;
            let b = (c + 516 * u + 128) >> 8;
            rgb.push(r.clamp(0, 255) as u8);
            rgb.push(g.clamp(0, 255) as u8);
            rgb.push(b.clamp(0, 255) as u8);
        }
    }

    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb24_passes_through_truncated_to_frame_size() {
        let data = vec![7u8; 2 * 2 * 3 + 4];
        let rgb = to_rgb24(&data, 2, 2, CaptureFormat::Rgb24).unwrap();
        assert_eq!(rgb.len(), 12);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(to_rgb24(&[0u8; 5], 2, 2, CaptureFormat::Rgb24).is_err());
        assert!(to_rgb24(&[0u8; 5], 2, 2, CaptureFormat::Yuyv).is_err());
    }

    #[test]
    fn yuyv_grey_maps_to_grey() {
        // Y=128, U=V=128 is mid grey in BT.601.
        let data = vec![128u8; 2 * 1 * 2];
        let rgb = to_rgb24(&data, 2, 1, CaptureFormat::Yuyv).unwrap();
        assert_eq!(rgb.len(), 6);
        for &channel in &rgb {
            assert!((125..=135).contains(&channel), "channel {}", channel);
        }
    }
}
