//! Detection stages
//!
//! ## Responsibilities
//!
//! - Common detection data model (kinds, severities, events)
//! - The pluggable `Detector` capability interface
//! - Concrete capabilities: motion, object, face
//! - The shared worker harness driving one capability per camera

mod face;
mod motion;
mod object;
mod worker;

pub use face::{FaceDetector, FaceEncoder, FaceGallery, FaceObservation, StubFaceEncoder};
pub use motion::MotionDetector;
pub use object::{ObjectDetector, ObjectModel, StubObjectModel};
pub use worker::DetectorWorker;

use crate::error::Result;
use crate::frame_buffer::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Detection stage type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Motion,
    Object,
    Face,
}

impl DetectionKind {
    pub const ALL: [DetectionKind; 3] =
        [DetectionKind::Motion, DetectionKind::Object, DetectionKind::Face];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::Motion => "motion",
            DetectionKind::Object => "object",
            DetectionKind::Face => "face",
        }
    }

    /// Category label stored on alert records
    pub fn location_label(&self) -> &'static str {
        match self {
            DetectionKind::Motion => "Motion Detection",
            DetectionKind::Object => "Object Detection",
            DetectionKind::Face => "Face Recognition",
        }
    }

    /// Notification subject line
    pub fn subject(&self) -> &'static str {
        match self {
            DetectionKind::Motion => "Motion Detected",
            DetectionKind::Object => "Object Detected",
            DetectionKind::Face => "Face Detected",
        }
    }
}

impl std::fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One detected object with its score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Stage-specific detection payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionDetails {
    Motion {
        foreground_pixels: u32,
    },
    Objects {
        detections: Vec<ObjectDetection>,
        top_label: String,
    },
    Face {
        name: String,
        bounding_box: BoundingBox,
    },
}

impl DetectionDetails {
    /// Boxes to draw on the evidence frame, if any
    pub fn bounding_boxes(&self) -> Vec<BoundingBox> {
        match self {
            DetectionDetails::Motion { .. } => Vec::new(),
            DetectionDetails::Objects { detections, .. } => {
                detections.iter().map(|d| d.bounding_box).collect()
            }
            DetectionDetails::Face { bounding_box, .. } => vec![*bounding_box],
        }
    }
}

/// Candidate alert condition produced by one detector stage,
/// consumed exactly once by the alert coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub camera_id: usize,
    pub kind: DetectionKind,
    pub severity: Severity,
    pub message: String,
    pub details: DetectionDetails,
    pub evidence_path: Option<PathBuf>,
    pub captured_at: DateTime<Utc>,
}

impl DetectionEvent {
    /// Rate-limit / coalescing key
    pub fn key(&self) -> (DetectionKind, usize) {
        (self.kind, self.camera_id)
    }
}

/// Capability output before the harness resolves evidence
#[derive(Debug, Clone)]
pub struct Detection {
    pub severity: Severity,
    pub message: String,
    pub details: DetectionDetails,
    /// Label embedded in the evidence file name, if any
    pub evidence_label: Option<String>,
}

/// Common interface for detection capabilities.
///
/// `evaluate` inspects one frame copy and reports at most one candidate
/// detection. Implementations keep whatever per-stage state they need
/// (background models, loaded networks) between calls.
pub trait Detector: Send {
    fn kind(&self) -> DetectionKind;

    fn evaluate(&mut self, frame: &Frame) -> Result<Option<Detection>>;
}
