//! Motion detection via background subtraction
//!
//! Maintains a per-pixel running-average grayscale background model and
//! counts foreground pixels per frame. A detection fires when the count
//! exceeds the camera's configured sensitivity threshold.

use super::{Detection, DetectionDetails, DetectionKind, Detector, Severity};
use crate::error::Result;
use crate::frame_buffer::Frame;

/// Absolute luma difference for a pixel to count as foreground
const FOREGROUND_DELTA: f32 = 25.0;

/// Blend factor folding each new frame into the background model
const LEARNING_RATE: f32 = 0.05;

/// Frames consumed before the model is considered warm
const WARMUP_FRAMES: u32 = 10;

pub struct MotionDetector {
    sensitivity: u32,
    background: Option<Vec<f32>>,
    frames_seen: u32,
}

impl MotionDetector {
    /// `sensitivity` is the camera's configured motion threshold: the
    /// minimum foreground pixel count that triggers a detection.
    pub fn new(sensitivity: u32) -> Self {
        Self {
            sensitivity,
            background: None,
            frames_seen: 0,
        }
    }

    fn luma_plane(frame: &Frame) -> Vec<f32> {
        let channels = frame.shape.channels as usize;
        if channels >= 3 {
            frame
                .data
                .chunks_exact(channels)
                .map(|px| {
                    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
                })
                .collect()
        } else {
            frame
                .data
                .chunks_exact(channels.max(1))
                .map(|px| px[0] as f32)
                .collect()
        }
    }
}

impl Detector for MotionDetector {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Motion
    }

    fn evaluate(&mut self, frame: &Frame) -> Result<Option<Detection>> {
        let luma = Self::luma_plane(frame);

        let background = match self.background.as_mut() {
            Some(bg) if bg.len() == luma.len() => bg,
            _ => {
                // Seed (or reseed after a geometry change) from this frame
                self.background = Some(luma);
                self.frames_seen = 1;
                return Ok(None);
            }
        };

        let mut foreground = 0u32;
        for (bg, &px) in background.iter_mut().zip(luma.iter()) {
            if (px - *bg).abs() > FOREGROUND_DELTA {
                foreground += 1;
            }
            *bg += LEARNING_RATE * (px - *bg);
        }
        self.frames_seen = self.frames_seen.saturating_add(1);

        if self.frames_seen <= WARMUP_FRAMES {
            return Ok(None);
        }

        if foreground > self.sensitivity {
            Ok(Some(Detection {
                severity: Severity::Medium,
                message: format!("Motion detected with score {foreground}"),
                details: DetectionDetails::Motion {
                    foreground_pixels: foreground,
                },
                evidence_label: None,
            }))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_buffer::FrameShape;

    const SHAPE: FrameShape = FrameShape::new(8, 8, 3);

    fn warm_up(detector: &mut MotionDetector, value: u8) {
        for _ in 0..=WARMUP_FRAMES {
            let result = detector.evaluate(&Frame::filled(SHAPE, value)).unwrap();
            assert!(result.is_none());
        }
    }

    #[test]
    fn test_static_scene_never_triggers() {
        let mut detector = MotionDetector::new(10);
        warm_up(&mut detector, 100);
        for _ in 0..20 {
            let result = detector.evaluate(&Frame::filled(SHAPE, 100)).unwrap();
            assert!(result.is_none());
        }
    }

    #[test]
    fn test_sudden_change_triggers_above_sensitivity() {
        let mut detector = MotionDetector::new(10);
        warm_up(&mut detector, 20);

        let detection = detector
            .evaluate(&Frame::filled(SHAPE, 220))
            .unwrap()
            .expect("whole-frame change should trigger");
        assert_eq!(detection.severity, Severity::Medium);
        match detection.details {
            DetectionDetails::Motion { foreground_pixels } => {
                assert_eq!(foreground_pixels, SHAPE.pixel_count() as u32);
                assert!(detection
                    .message
                    .contains(&foreground_pixels.to_string()));
            }
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[test]
    fn test_change_below_sensitivity_is_ignored() {
        // Sensitivity above the whole pixel count can never be exceeded
        let mut detector = MotionDetector::new(SHAPE.pixel_count() as u32 + 1);
        warm_up(&mut detector, 20);
        let result = detector.evaluate(&Frame::filled(SHAPE, 220)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_model_reseeds_on_geometry_change() {
        let mut detector = MotionDetector::new(1);
        warm_up(&mut detector, 20);

        let other_shape = FrameShape::new(4, 4, 3);
        let result = detector
            .evaluate(&Frame::filled(other_shape, 220))
            .unwrap();
        assert!(result.is_none());
    }
}
