//! Daemon entry point: capture, process, emit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use guardian_vision::capture::open_source;
use guardian_vision::config::GuardianConfig;
use guardian_vision::detect::backends::{StubFaceEngine, StubObjectDetector};
use guardian_vision::detect::{FaceEngine, ObjectDetector};
use guardian_vision::engine::Engine;
use guardian_vision::identity::Gallery;
use guardian_vision::output::Emitter;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GuardianConfig::load().context("load configuration")?;
    log::info!(
        "guardiand starting: camera={} backend={} output={}",
        config.camera.kind,
        config.models.backend,
        config.output.mode
    );

    let gallery = Gallery::load(&config.gallery_path);
    let (object, face) = build_backends(&config)?;
    let mut engine = Engine::new(config.engine_config()?, object, face, gallery);

    let mut source = open_source(&config.camera).context("open frame source")?;
    source.connect().context("connect frame source")?;

    let emitter = match config.output.mode.as_str() {
        "preview" => Emitter::Preview {
            path: config.output.preview_path.clone(),
        },
        _ => Emitter::Jsonl {
            attach_frames: config.output.attach_frames,
        },
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("install shutdown handler")?;
    }

    while running.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame capture failed: {:#}", err);
                std::thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let fused = engine.process_frame(&frame);
        if let Err(err) = emitter.emit(&frame, &fused, engine.last_magnitude()) {
            log::warn!("emit failed for frame {}: {:#}", frame.seq, err);
        }
    }

    source.close();
    let stats = source.stats();
    log::info!(
        "guardiand stopped after {} frames from {}",
        stats.frames_captured,
        stats.endpoint
    );
    Ok(())
}

/// Backend construction is fatal on failure; a daemon without working
/// inference adapters has nothing to cache or degrade to.
fn build_backends(
    config: &GuardianConfig,
) -> Result<(Box<dyn ObjectDetector>, Box<dyn FaceEngine>)> {
    match config.models.backend.as_str() {
        "stub" => Ok((
            Box::new(StubObjectDetector::on_change()),
            Box::new(StubFaceEngine::quiet()),
        )),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            use guardian_vision::detect::backends::{TractFaceEngine, TractObjectDetector};

            let weights = config
                .models
                .object_weights
                .as_ref()
                .context("models.object_weights is required for the tract backend")?;
            let locator = config
                .models
                .face_locator
                .as_ref()
                .context("models.face_locator is required for the tract backend")?;
            let embedder = config
                .models
                .face_embedder
                .as_ref()
                .context("models.face_embedder is required for the tract backend")?;

            let mut object =
                TractObjectDetector::new(weights, config.camera.width, config.camera.height)
                    .context("load object detection model")?;
            let mut face = TractFaceEngine::new(
                locator,
                embedder,
                config.camera.width,
                config.camera.height,
            )
            .context("load face models")?;
            object.warm_up().context("warm up object model")?;
            face.warm_up().context("warm up face models")?;
            Ok((Box::new(object), Box::new(face)))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => bail!("backend 'tract' requires the backend-tract feature"),
        other => bail!("unknown inference backend '{}'", other),
    }
}
