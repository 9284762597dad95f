//! Face recognition stage
//!
//! Delegates embedding extraction to an external `FaceEncoder` and matches
//! each embedding against a precomputed gallery of known faces by Euclidean
//! distance, falling back to an "unknown" label.

use super::{BoundingBox, Detection, DetectionDetails, DetectionKind, Detector, Severity};
use crate::error::{Error, Result};
use crate::frame_buffer::Frame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Distance at or under which an embedding matches a gallery entry
pub const MATCH_TOLERANCE: f32 = 0.6;

/// Label used when no gallery entry matches
pub const UNKNOWN_LABEL: &str = "unknown";

/// One face found in a frame
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub embedding: Vec<f32>,
    pub bounding_box: BoundingBox,
}

/// External face-embedding extractor boundary
pub trait FaceEncoder: Send {
    fn encode(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>>;

    /// Encoder name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GalleryEntry {
    name: String,
    embedding: Vec<f32>,
}

/// Precomputed known-face embeddings
#[derive(Debug, Default)]
pub struct FaceGallery {
    entries: Vec<GalleryEntry>,
    tolerance: f32,
}

impl FaceGallery {
    pub fn new(tolerance: f32) -> Self {
        Self {
            entries: Vec::new(),
            tolerance,
        }
    }

    /// Empty gallery with the default tolerance; every face matches as
    /// unknown.
    pub fn empty() -> Self {
        Self::new(MATCH_TOLERANCE)
    }

    /// Load a gallery from a JSON file of `{ "name", "embedding" }` entries
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read face gallery {}: {e}", path.display()))
        })?;
        let entries: Vec<GalleryEntry> = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            known_faces = entries.len(),
            "Face gallery loaded"
        );
        Ok(Self {
            entries,
            tolerance: MATCH_TOLERANCE,
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, embedding: Vec<f32>) {
        self.entries.push(GalleryEntry {
            name: name.into(),
            embedding,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest gallery name within tolerance, if any
    pub fn best_match(&self, embedding: &[f32]) -> Option<&str> {
        self.entries
            .iter()
            .map(|entry| (distance(&entry.embedding, embedding), entry))
            .filter(|(d, _)| *d <= self.tolerance)
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, entry)| entry.name.as_str())
    }
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub struct FaceDetector {
    encoder: Box<dyn FaceEncoder>,
    gallery: Arc<FaceGallery>,
}

impl FaceDetector {
    pub fn new(encoder: Box<dyn FaceEncoder>, gallery: Arc<FaceGallery>) -> Self {
        Self { encoder, gallery }
    }
}

impl Detector for FaceDetector {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Face
    }

    fn evaluate(&mut self, frame: &Frame) -> Result<Option<Detection>> {
        let observations = self.encoder.encode(frame)?;
        let Some(face) = observations.first() else {
            return Ok(None);
        };

        let name = self
            .gallery
            .best_match(&face.embedding)
            .unwrap_or(UNKNOWN_LABEL)
            .to_string();

        Ok(Some(Detection {
            severity: Severity::High,
            message: format!("Face detected: {name}"),
            evidence_label: Some(name.clone()),
            details: DetectionDetails::Face {
                name,
                bounding_box: face.bounding_box,
            },
        }))
    }
}

/// Placeholder encoder used when no real extractor is wired in
pub struct StubFaceEncoder;

impl FaceEncoder for StubFaceEncoder {
    fn encode(&mut self, _frame: &Frame) -> Result<Vec<FaceObservation>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "stub"
    }
}
