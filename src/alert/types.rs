//! Alert records

use crate::detector::{DetectionEvent, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Review lifecycle of an alert. The core always creates alerts as `New`;
/// the later states belong to the external review surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
}

/// Durable, reviewable representation of an accepted detection event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Assigned by the alert store on persist
    pub id: Option<u64>,
    pub camera_id: usize,
    /// Display name, e.g. "Camera 0"
    pub camera: String,
    /// Category label, e.g. "Motion Detection"
    pub location: String,
    pub time: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
    pub status: AlertStatus,
    /// Set by a reviewer; `None` until reviewed
    pub is_true_detection: Option<bool>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub evidence_path: Option<PathBuf>,
}

impl AlertRecord {
    /// Build a fresh record from an accepted event. Camera id, severity
    /// and message carry over verbatim.
    pub fn from_event(event: &DetectionEvent, evidence_path: Option<PathBuf>) -> Self {
        Self {
            id: None,
            camera_id: event.camera_id,
            camera: format!("Camera {}", event.camera_id),
            location: event.kind.location_label().to_string(),
            time: Utc::now(),
            message: event.message.clone(),
            severity: event.severity,
            status: AlertStatus::New,
            is_true_detection: None,
            reviewed_by: None,
            reviewed_at: None,
            evidence_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectionDetails, DetectionKind};

    #[test]
    fn test_record_preserves_event_fields() {
        let event = DetectionEvent {
            camera_id: 3,
            kind: DetectionKind::Motion,
            severity: Severity::Medium,
            message: "Motion detected with score 512".to_string(),
            details: DetectionDetails::Motion {
                foreground_pixels: 512,
            },
            evidence_path: None,
            captured_at: Utc::now(),
        };

        let record = AlertRecord::from_event(&event, Some(PathBuf::from("/tmp/x.jpg")));
        assert_eq!(record.camera_id, 3);
        assert_eq!(record.camera, "Camera 3");
        assert_eq!(record.location, "Motion Detection");
        assert_eq!(record.message, event.message);
        assert_eq!(record.severity, Severity::Medium);
        assert_eq!(record.status, AlertStatus::New);
        assert!(record.is_true_detection.is_none());
        assert!(record.reviewed_by.is_none());
        assert_eq!(record.evidence_path, Some(PathBuf::from("/tmp/x.jpg")));
    }
}
