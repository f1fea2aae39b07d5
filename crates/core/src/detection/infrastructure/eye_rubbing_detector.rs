use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detection::domain::counters::ConsecutiveCounter;
use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
use crate::detection::domain::landmarks::{FaceLandmarks, HandLandmarks};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeRubbingConfig {
    /// Normalized distance from an eye that counts as touching it.
    pub proximity_threshold: f64,
    /// Consecutive frames of contact before alerting (~1 s at 30 fps).
    pub frames_threshold: u32,
}

impl Default for EyeRubbingConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: 0.02,
            frames_threshold: 30,
        }
    }
}

/// Flags a wrist or fingertip kept at either eye.
pub struct EyeRubbingDetector {
    config: EyeRubbingConfig,
    counter: ConsecutiveCounter,
    status: String,
}

impl EyeRubbingDetector {
    pub fn new(config: EyeRubbingConfig) -> Self {
        let counter = ConsecutiveCounter::new(config.frames_threshold);
        Self {
            config,
            counter,
            status: "Monitoring".to_string(),
        }
    }

    fn hand_near_eyes(&self, face: &FaceLandmarks, hands: &[HandLandmarks]) -> bool {
        let left = face.left_eye();
        let right = face.right_eye();
        let limit = self.config.proximity_threshold;
        hands
            .iter()
            .flat_map(|hand| hand.check_points())
            .any(|p| p.distance(&left) < limit || p.distance(&right) < limit)
    }
}

impl Detector for EyeRubbingDetector {
    fn id(&self) -> &'static str {
        "eye_rubbing"
    }

    fn name(&self) -> &'static str {
        "Eye Rubbing"
    }

    fn alert_message(&self) -> &'static str {
        "Stop rubbing your eyes! This can cause irritation."
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        let Some(face) = input.face else {
            self.status = "No face detected".to_string();
            self.counter.reset();
            return Ok(false);
        };
        let Some(hands) = input.hands() else {
            self.status = "No hands detected".to_string();
            self.counter.reset();
            return Ok(false);
        };

        let near = self.hand_near_eyes(face, hands);
        let fired = self.counter.observe(near);
        self.status = if near {
            format!(
                "Hand near eyes ({}/{})",
                if fired { self.counter.threshold() } else { self.counter.count() },
                self.counter.threshold()
            )
        } else {
            "No eye rubbing detected".to_string()
        };
        Ok(fired)
    }

    fn reset(&mut self, _now: Instant) {
        self.counter.reset();
        self.status = "Monitoring".to_string();
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}
