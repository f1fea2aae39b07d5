use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
use crate::detection::domain::landmarks::{
    FaceLandmarks, LEFT_EYE_LOWER, LEFT_EYE_UPPER, RIGHT_EYE_LOWER, RIGHT_EYE_UPPER,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkRateConfig {
    /// Eye openness below which the eyes count as closed.
    pub ear_threshold: f64,
    /// Blinks per minute under which the rate is too low.
    pub min_blinks_per_minute: f64,
    /// Length of each measurement period, in seconds.
    pub check_interval_secs: u64,
}

impl Default for BlinkRateConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.012,
            min_blinks_per_minute: 6.0,
            check_interval_secs: 60,
        }
    }
}

/// Counts blinks over fixed periods and flags a rate below the minimum.
///
/// A blink is an open→closed transition. At the end of each period the rate
/// is evaluated once and the count starts over.
pub struct BlinkRateDetector {
    config: BlinkRateConfig,
    blink_count: u32,
    period_start: Instant,
    was_eyes_closed: bool,
    status: String,
}

impl BlinkRateDetector {
    pub fn new(config: BlinkRateConfig, now: Instant) -> Self {
        Self {
            config,
            blink_count: 0,
            period_start: now,
            was_eyes_closed: false,
            status: "Monitoring".to_string(),
        }
    }

    /// Mean upper-to-lower eyelid distance over both eyes.
    pub fn eye_aspect_ratio(face: &FaceLandmarks) -> f64 {
        let left = eyelid_gap(face, &LEFT_EYE_UPPER, &LEFT_EYE_LOWER);
        let right = eyelid_gap(face, &RIGHT_EYE_UPPER, &RIGHT_EYE_LOWER);
        (left + right) / 2.0
    }

    fn check_interval(&self) -> Duration {
        Duration::from_secs(self.config.check_interval_secs.max(1))
    }
}

fn eyelid_gap(face: &FaceLandmarks, upper: &[usize], lower: &[usize]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0;
    for &u in upper {
        for &l in lower {
            sum += (face.point(u).y - face.point(l).y).abs();
            n += 1;
        }
    }
    sum / n as f64
}

impl Detector for BlinkRateDetector {
    fn id(&self) -> &'static str {
        "blink_rate"
    }

    fn name(&self) -> &'static str {
        "Blink Rate"
    }

    fn alert_message(&self) -> &'static str {
        "Blink more! You're not blinking enough."
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        let Some(face) = input.face else {
            self.status = "No face detected".to_string();
            self.was_eyes_closed = false;
            return Ok(false);
        };

        let eyes_closed = Self::eye_aspect_ratio(face) < self.config.ear_threshold;
        if eyes_closed && !self.was_eyes_closed {
            self.blink_count += 1;
        }
        self.was_eyes_closed = eyes_closed;

        let elapsed = input.now.saturating_duration_since(self.period_start);
        if elapsed < self.check_interval() {
            self.status = format!(
                "Tracking: {} blinks in {:.0}s",
                self.blink_count,
                elapsed.as_secs_f64()
            );
            return Ok(false);
        }

        let per_minute = self.blink_count as f64 / elapsed.as_secs_f64() * 60.0;
        let low_rate = per_minute < self.config.min_blinks_per_minute;
        self.status = if low_rate {
            format!("Low blink rate: {per_minute:.1}/min")
        } else {
            format!("Blink rate OK: {per_minute:.1}/min")
        };

        self.blink_count = 0;
        self.period_start = input.now;
        Ok(low_rate)
    }

    fn reset(&mut self, now: Instant) {
        self.blink_count = 0;
        self.period_start = now;
        self.was_eyes_closed = false;
        self.status = "Monitoring".to_string();
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}
