//! CSI camera source via GStreamer.
//!
//! Builds an `nvarguscamerasrc` pipeline for Jetson-class boards and pulls
//! RGB samples through an appsink. Pipeline bus errors mark the source
//! unhealthy so the daemon can decide to bail or retry.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::Frame;

pub struct CsiCameraSource {
    settings: CameraSettings,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
}

/// Argus capture pipeline description for a CSI sensor.
fn csi_pipeline(settings: &CameraSettings) -> String {
    format!(
        "nvarguscamerasrc sensor-id={} ! \
         video/x-raw(memory:NVMM),width={},height={},framerate={}/1 ! \
         nvvidconv flip-method={} ! videoconvert ! video/x-raw,format=RGB ! \
         appsink name=appsink sync=false max-buffers=1 drop=true",
        settings.sensor_id,
        settings.width,
        settings.height,
        settings.target_fps,
        settings.flip_method
    )
}

impl CsiCameraSource {
    pub fn new(settings: &CameraSettings) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let description = csi_pipeline(settings);
        let pipeline = gstreamer::parse_launch(&description)
            .context("build CSI pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("CSI pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            settings: settings.clone(),
            pipeline,
            appsink,
            frame_count: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
        })
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.settings.target_fps == 0 {
            500
        } else {
            (1000 / self.settings.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.settings.target_fps == 0 {
            2_000
        } else {
            (1000 / self.settings.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(Duration::from_millis(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

impl FrameSource for CsiCameraSource {
    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set CSI pipeline to Playing")?;
        self.connected_at = Some(Instant::now());
        log::info!(
            "CSI camera ready: sensor {} at {}x{}",
            self.settings.sensor_id,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.poll_bus();

        let timeout = self.frame_timeout();
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .context("pull CSI sample")?
            .ok_or_else(|| anyhow!("CSI stream stalled"))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(pixels, width, height, self.frame_count)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            endpoint: format!("csi://sensor-{}", self.settings.sensor_id),
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("failed to stop CSI pipeline: {}", err);
        }
        self.connected_at = None;
    }
}

impl Drop for CsiCameraSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("CSI sample missing buffer")?;
    let caps = sample.caps().context("CSI sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse CSI caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer.map_readable().context("map CSI buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("CSI buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
