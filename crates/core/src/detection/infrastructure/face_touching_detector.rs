use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::detection::domain::counters::SlidingWindowCounter;
use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
use crate::detection::domain::landmarks::{FaceLandmarks, HandLandmarks, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceTouchingConfig {
    /// Horizontal radius of the face oval (normalized).
    pub horizontal_threshold: f64,
    /// Vertical radius of the face oval (normalized).
    pub vertical_threshold: f64,
    /// Touches within the window that trigger an alert.
    pub max_touches: usize,
    pub window_secs: u64,
}

impl Default for FaceTouchingConfig {
    fn default() -> Self {
        Self {
            horizontal_threshold: 0.12,
            vertical_threshold: 0.35,
            max_touches: 5,
            window_secs: 120,
        }
    }
}

/// Flags frequent face touching: too many distinct touches in a time window.
///
/// The face zone is an oval centred on the nose tip. A touch is counted when
/// any wrist or fingertip enters the oval; staying inside does not count again.
pub struct FaceTouchingDetector {
    config: FaceTouchingConfig,
    touches: SlidingWindowCounter,
    status: String,
}

impl FaceTouchingDetector {
    pub fn new(config: FaceTouchingConfig) -> Self {
        let touches =
            SlidingWindowCounter::new(Duration::from_secs(config.window_secs), config.max_touches);
        Self {
            config,
            touches,
            status: "Monitoring".to_string(),
        }
    }

    pub fn is_inside_oval(&self, point: Point, center: Point) -> bool {
        let dx = (point.x - center.x) / self.config.horizontal_threshold;
        let dy = (point.y - center.y) / self.config.vertical_threshold;
        dx * dx + dy * dy < 1.0
    }

    fn hand_in_face_zone(&self, face: &FaceLandmarks, hands: &[HandLandmarks]) -> bool {
        let center = face.nose_tip();
        hands
            .iter()
            .flat_map(|hand| hand.check_points())
            .any(|p| self.is_inside_oval(p, center))
    }

    fn window_label(&self) -> String {
        let secs = self.config.window_secs;
        if secs % 60 == 0 {
            format!("{}min", secs / 60)
        } else {
            format!("{secs}s")
        }
    }
}

impl Detector for FaceTouchingDetector {
    fn id(&self) -> &'static str {
        "face_touching"
    }

    fn name(&self) -> &'static str {
        "Face Touching"
    }

    fn alert_message(&self) -> &'static str {
        "Stop touching your face! Reduce stress and hygiene risk."
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        let Some(face) = input.face else {
            self.status = "No face detected".to_string();
            self.touches.interrupt();
            self.touches.expire(input.now);
            return Ok(false);
        };
        let Some(hands) = input.hands() else {
            self.status = "No hands detected".to_string();
            self.touches.interrupt();
            self.touches.expire(input.now);
            return Ok(false);
        };

        let touching = self.hand_in_face_zone(face, hands);
        let frequent = self.touches.observe(touching, input.now);
        let count = self.touches.count();

        self.status = if frequent {
            format!("Frequent touching! {count} in {}", self.window_label())
        } else if count > 0 {
            format!(
                "Face touches: {count}/{} in {}",
                self.config.max_touches,
                self.window_label()
            )
        } else {
            "No face touching".to_string()
        };
        Ok(frequent)
    }

    fn reset(&mut self, _now: Instant) {
        self.touches.reset();
        self.status = "Monitoring".to_string();
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}
