//! Gallery enrollment tool.
//!
//! Scans a directory of photos, locates one face per photo, embeds it, and
//! writes the collected embeddings as the JSON gallery the daemon loads.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use guardian_vision::detect::FaceEngine;
use guardian_vision::frame::Frame;
use guardian_vision::identity::Gallery;

#[derive(Parser, Debug)]
#[command(name = "enroll_faces", about = "Build a face gallery from photos")]
struct Args {
    /// Directory of enrollment photos (jpg/jpeg/png).
    photos: PathBuf,

    /// Output gallery file.
    #[arg(long, default_value = "gallery.json")]
    out: PathBuf,

    /// Inference backend; only "tract" can embed real faces.
    #[arg(long, env = "GUARDIAN_BACKEND", default_value = "tract")]
    backend: String,

    /// Face locator model path.
    #[arg(long, env = "GUARDIAN_FACE_LOCATOR")]
    face_locator: Option<PathBuf>,

    /// Face embedder model path.
    #[arg(long, env = "GUARDIAN_FACE_EMBEDDER")]
    face_embedder: Option<PathBuf>,

    /// Width photos are resized to before location.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Height photos are resized to before location.
    #[arg(long, default_value_t = 480)]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut engine = build_face_engine(&args)?;

    let mut photos: Vec<PathBuf> = std::fs::read_dir(&args.photos)
        .with_context(|| format!("read photo directory {}", args.photos.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("jpg") | Some("jpeg") | Some("png")
            )
        })
        .collect();
    photos.sort();

    if photos.is_empty() {
        bail!("no photos found in {}", args.photos.display());
    }

    let mut gallery = Gallery::empty();
    let mut failures = 0usize;
    for path in &photos {
        match enroll_photo(engine.as_mut(), path, args.width, args.height) {
            Ok(embedding) => {
                gallery.push(embedding);
                log::info!("enrolled {}", path.display());
            }
            Err(err) => {
                failures += 1;
                log::warn!("skipped {}: {:#}", path.display(), err);
            }
        }
    }

    gallery.save(&args.out)?;
    log::info!(
        "gallery written to {}: {} enrolled, {} skipped",
        args.out.display(),
        gallery.len(),
        failures
    );
    Ok(())
}

fn enroll_photo(
    engine: &mut dyn FaceEngine,
    path: &Path,
    width: u32,
    height: u32,
) -> Result<guardian_vision::identity::Embedding> {
    let photo = image::open(path)
        .with_context(|| format!("open photo {}", path.display()))?
        .to_rgb8();
    let resized =
        image::imageops::resize(&photo, width, height, image::imageops::FilterType::Triangle);
    let frame = Frame::new(resized.into_raw(), width, height, 0)?;

    let locations = engine.locate(&frame)?;
    let bbox = locations.first().context("no face located")?;
    engine.embed(&frame, bbox)
}

fn build_face_engine(args: &Args) -> Result<Box<dyn FaceEngine>> {
    match args.backend.as_str() {
        #[cfg(feature = "backend-tract")]
        "tract" => {
            use guardian_vision::detect::backends::TractFaceEngine;

            let locator = args
                .face_locator
                .as_ref()
                .context("--face-locator is required for the tract backend")?;
            let embedder = args
                .face_embedder
                .as_ref()
                .context("--face-embedder is required for the tract backend")?;
            let engine = TractFaceEngine::new(locator, embedder, args.width, args.height)
                .context("load face models")?;
            Ok(Box::new(engine))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => bail!("backend 'tract' requires the backend-tract feature"),
        other => bail!("backend '{}' cannot embed faces for enrollment", other),
    }
}
