use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detection::domain::counters::ConsecutiveCounter;
use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
use crate::detection::domain::landmarks::FaceLandmarks;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Horizontal nose offset from the eye midpoint that counts as looking away.
    pub gaze_threshold: f64,
    /// Consecutive away frames before alerting (~5 s at 30 fps).
    pub frames_threshold: u32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            gaze_threshold: 0.3,
            frames_threshold: 150,
        }
    }
}

/// Flags sustained attention away from the screen.
///
/// Unlike every other detector, a missing face *is* the condition here: the
/// user is assumed to have left the desk.
pub struct FocusDetector {
    config: FocusConfig,
    counter: ConsecutiveCounter,
    status: String,
}

impl FocusDetector {
    pub fn new(config: FocusConfig) -> Self {
        let counter = ConsecutiveCounter::new(config.frames_threshold);
        Self {
            config,
            counter,
            status: "Monitoring".to_string(),
        }
    }

    /// Horizontal distance between the nose tip and the eye midpoint.
    pub fn gaze_offset(face: &FaceLandmarks) -> f64 {
        let eye_mid = face.left_eye().midpoint(&face.right_eye());
        (face.nose_tip().x - eye_mid.x).abs()
    }
}

impl Detector for FocusDetector {
    fn id(&self) -> &'static str {
        "focus"
    }

    fn name(&self) -> &'static str {
        "Screen Focus"
    }

    fn alert_message(&self) -> &'static str {
        "Focus on your work! You've been distracted."
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        let away = match input.face {
            None => {
                self.status = "No face detected - not at desk?".to_string();
                true
            }
            Some(face) => {
                let offset = Self::gaze_offset(face);
                let away = offset > self.config.gaze_threshold;
                self.status = if away {
                    format!("LOOKING AWAY (offset: {offset:.2})")
                } else {
                    format!("Focused on screen (offset: {offset:.2})")
                };
                away
            }
        };
        Ok(self.counter.observe(away))
    }

    fn reset(&mut self, _now: Instant) {
        self.counter.reset();
        self.status = "Monitoring".to_string();
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::landmarks::fixtures::{face_with, neutral_face};
    use crate::detection::domain::landmarks::{Point, NOSE_TIP};
    use approx::assert_relative_eq;

    fn input(face: Option<&FaceLandmarks>) -> DetectionInput<'_> {
        DetectionInput {
            face,
            hands: &[],
            frame_width: 640,
            frame_height: 480,
            now: Instant::now(),
        }
    }

    fn detector(frames: u32) -> FocusDetector {
        FocusDetector::new(FocusConfig {
            gaze_threshold: 0.3,
            frames_threshold: frames,
        })
    }

    #[test]
    fn test_gaze_offset_frontal_is_zero() {
        assert_relative_eq!(FocusDetector::gaze_offset(&neutral_face()), 0.0);
    }

    #[test]
    fn test_absent_face_counts_as_away() {
        let mut d = detector(3);
        assert!(!d.detect(&input(None)).unwrap());
        assert!(!d.detect(&input(None)).unwrap());
        assert!(d.detect(&input(None)).unwrap());
        assert_eq!(d.status(), "No face detected - not at desk?");
    }

    #[test]
    fn test_turned_head_counts_as_away() {
        let mut d = detector(1);
        let turned = face_with(&[(NOSE_TIP, Point::new(0.85, 0.5))]);
        assert!(d.detect(&input(Some(&turned))).unwrap());
        assert!(d.status().starts_with("LOOKING AWAY"));
    }

    #[test]
    fn test_focused_face_resets_run() {
        let mut d = detector(3);
        let face = neutral_face();
        d.detect(&input(None)).unwrap();
        d.detect(&input(None)).unwrap();
        assert!(!d.detect(&input(Some(&face))).unwrap());
        assert_eq!(d.counter.count(), 0);
        assert!(d.status().starts_with("Focused on screen"));
    }
}
