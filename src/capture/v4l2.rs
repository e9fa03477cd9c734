//! USB camera source via V4L2.
//!
//! Opens `/dev/video{index}` and falls back to probing `/dev/video0` when
//! the configured node is absent. Prefers RGB3 output from the driver and
//! normalizes YUYV when that is all the camera offers.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::normalize::{to_rgb24, CaptureFormat};
use super::{FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::Frame;

pub struct UsbCameraSource {
    settings: CameraSettings,
    state: Option<UsbCameraState>,
    device_path: String,
    format: CaptureFormat,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct UsbCameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl UsbCameraSource {
    pub fn new(settings: &CameraSettings) -> Self {
        Self {
            active_width: settings.width,
            active_height: settings.height,
            device_path: format!("/dev/video{}", settings.device_index),
            settings: settings.clone(),
            state: None,
            format: CaptureFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    /// Configured node first, then the conventional default node.
    fn probe_device(&mut self) -> Result<v4l::Device> {
        let configured = format!("/dev/video{}", self.settings.device_index);
        if Path::new(&configured).exists() {
            self.device_path = configured.clone();
            return v4l::Device::with_path(&configured)
                .with_context(|| format!("open v4l2 device {}", configured));
        }

        log::warn!("{} not present, probing /dev/video0", configured);
        self.device_path = "/dev/video0".to_string();
        v4l::Device::with_path("/dev/video0").context("open v4l2 device /dev/video0")
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.settings.target_fps == 0 {
            2_000
        } else {
            (1000 / self.settings.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for UsbCameraSource {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = self.probe_device()?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("failed to set format on {}: {}", self.device_path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.format = if &format.fourcc.repr == b"RGB3" {
            CaptureFormat::Rgb24
        } else if &format.fourcc.repr == b"YUYV" {
            CaptureFormat::Yuyv
        } else {
            anyhow::bail!(
                "{} offers unsupported pixel format {}",
                self.device_path,
                format.fourcc
            );
        };

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("failed to set fps on {}: {}", self.device_path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = UsbCameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "USB camera ready: {} at {}x{} ({:?})",
            self.device_path,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        let pixels = to_rgb24(buf, self.active_width, self.active_height, self.format)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(pixels, self.active_width, self.active_height, self.frame_count)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            endpoint: self.device_path.clone(),
        }
    }

    fn close(&mut self) {
        self.state = None;
    }
}
