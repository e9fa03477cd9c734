//! Face identity: embeddings, the enrolled gallery, and classification.
//!
//! A gallery is a JSON array of fixed-length float vectors. Classification
//! is nearest-neighbor under Euclidean distance: if the closest enrolled
//! embedding is within the tolerance the probe is an enrolled person,
//! otherwise a stranger. With no gallery at all the face track degrades to
//! bare presence, reported as `human`.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

/// Embedding width produced by the face embedder.
pub const EMBEDDING_DIM: usize = 128;

/// Fixed-length face descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != EMBEDDING_DIM {
            return Err(anyhow!(
                "embedding has {} components, expected {}",
                values.len(),
                EMBEDDING_DIM
            ));
        }
        Ok(Self(values))
    }

    pub fn components(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to another embedding.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Set of enrolled face embeddings.
#[derive(Clone, Debug, Default)]
pub struct Gallery {
    entries: Vec<Embedding>,
}

impl Gallery {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_embeddings(entries: Vec<Embedding>) -> Self {
        Self { entries }
    }

    /// Load a gallery, degrading to empty on any error.
    ///
    /// A missing or malformed gallery file must not stop the pipeline;
    /// it only downgrades identity output to `human`.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(gallery) => {
                log::info!(
                    "loaded {} enrolled embedding(s) from {}",
                    gallery.len(),
                    path.display()
                );
                gallery
            }
            Err(err) => {
                log::warn!(
                    "gallery {} unavailable, identities degrade to presence: {:#}",
                    path.display(),
                    err
                );
                Self::empty()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read gallery file {}", path.display()))?;
        let vectors: Vec<Vec<f32>> = serde_json::from_str(&raw)
            .with_context(|| format!("parse gallery file {}", path.display()))?;
        let mut entries = Vec::with_capacity(vectors.len());
        for (i, values) in vectors.into_iter().enumerate() {
            let embedding =
                Embedding::new(values).with_context(|| format!("gallery entry {}", i))?;
            entries.push(embedding);
        }
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let vectors: Vec<&[f32]> = self.entries.iter().map(Embedding::components).collect();
        let raw = serde_json::to_string(&vectors).context("serialize gallery")?;
        fs::write(path, raw).with_context(|| format!("write gallery file {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, embedding: Embedding) {
        self.entries.push(embedding);
    }

    /// Distance from the probe to every enrolled embedding, in gallery order.
    pub fn distances(&self, probe: &Embedding) -> Vec<f32> {
        self.entries.iter().map(|e| e.distance(probe)).collect()
    }

    /// Distance from the probe to the nearest enrolled embedding.
    pub fn min_distance(&self, probe: &Embedding) -> Option<f32> {
        self.distances(probe)
            .into_iter()
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Identity outcome for a located face.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityLabel {
    /// Face present, no gallery to compare against.
    Human,
    /// Nearest enrolled embedding within tolerance.
    Enrolled { score: f32 },
    /// Nearest enrolled embedding beyond tolerance.
    Stranger { score: f32 },
}

impl fmt::Display for IdentityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityLabel::Human => write!(f, "human"),
            IdentityLabel::Enrolled { score } => write!(f, "enrolled ({:.2})", score),
            IdentityLabel::Stranger { score } => write!(f, "stranger ({:.2})", score),
        }
    }
}

impl IdentityLabel {
    /// Identity string for downstream consumers; `None` for bare presence.
    pub fn face_id(&self) -> Option<&'static str> {
        match self {
            IdentityLabel::Human => None,
            IdentityLabel::Enrolled { .. } => Some("enrolled"),
            IdentityLabel::Stranger { .. } => Some("stranger"),
        }
    }
}

/// Classify a probe embedding against the gallery.
///
/// Score is `1 - d_min` clamped to `[0, 1]`, so identical embeddings
/// score 1.0 and anything at distance >= 1 scores 0.
pub fn classify(gallery: &Gallery, probe: &Embedding, tolerance: f32) -> IdentityLabel {
    match gallery.min_distance(probe) {
        None => IdentityLabel::Human,
        Some(d_min) => {
            let score = (1.0 - d_min).clamp(0.0, 1.0);
            if d_min < tolerance {
                IdentityLabel::Enrolled { score }
            } else {
                IdentityLabel::Stranger { score }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn embedding(fill: f32) -> Embedding {
        Embedding::new(vec![fill; EMBEDDING_DIM]).unwrap()
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        assert!(Embedding::new(vec![0.0; EMBEDDING_DIM - 1]).is_err());
        assert!(Embedding::new(Vec::new()).is_err());
    }

    #[test]
    fn empty_gallery_reports_bare_presence() {
        let gallery = Gallery::empty();
        assert_eq!(
            classify(&gallery, &embedding(0.3), 0.45),
            IdentityLabel::Human
        );
    }

    #[test]
    fn identical_probe_is_enrolled_with_full_score() {
        let gallery = Gallery::from_embeddings(vec![embedding(0.25)]);
        match classify(&gallery, &embedding(0.25), 0.45) {
            IdentityLabel::Enrolled { score } => assert_eq!(score, 1.0),
            other => panic!("expected enrolled, got {:?}", other),
        }
    }

    #[test]
    fn distant_probe_is_a_stranger() {
        // Distance is 0.1 * sqrt(128) ~= 1.13, beyond any sane tolerance.
        let gallery = Gallery::from_embeddings(vec![embedding(0.0)]);
        match classify(&gallery, &embedding(0.1), 0.45) {
            IdentityLabel::Stranger { score } => assert_eq!(score, 0.0),
            other => panic!("expected stranger, got {:?}", other),
        }
    }

    #[test]
    fn nearest_entry_decides() {
        let gallery = Gallery::from_embeddings(vec![embedding(0.5), embedding(0.0)]);
        let d = gallery.min_distance(&embedding(0.0)).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn missing_gallery_degrades_to_empty() {
        let gallery = Gallery::load(Path::new("/nonexistent/gallery.json"));
        assert!(gallery.is_empty());
    }

    #[test]
    fn malformed_gallery_degrades_to_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(Gallery::load(file.path()).is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        let gallery = Gallery::from_embeddings(vec![embedding(0.1), embedding(0.9)]);
        gallery.save(&path).unwrap();

        let loaded = Gallery::try_load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.min_distance(&embedding(0.9)).unwrap(), 0.0);
    }
}
