use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::detection::domain::counters::IntervalTimer;
use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    pub interval_minutes: u64,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 45,
        }
    }
}

/// Time-based reminder to drink water. Ignores landmarks entirely.
pub struct HydrationDetector {
    timer: IntervalTimer,
    status: String,
}

impl HydrationDetector {
    pub fn new(config: HydrationConfig, now: Instant) -> Self {
        let interval = Duration::from_secs(config.interval_minutes.max(1) * 60);
        Self {
            timer: IntervalTimer::new(interval, now),
            status: "Monitoring".to_string(),
        }
    }
}

impl Detector for HydrationDetector {
    fn id(&self) -> &'static str {
        "hydration"
    }

    fn name(&self) -> &'static str {
        "Hydration"
    }

    fn alert_message(&self) -> &'static str {
        "Time to hydrate! Drink some water."
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        if self.timer.poll(input.now) {
            self.status = "Drink water now!".to_string();
            return Ok(true);
        }
        let left = self.timer.remaining(input.now).as_secs();
        self.status = format!("Next reminder in {}m {}s", left / 60, left % 60);
        Ok(false)
    }

    fn reset(&mut self, now: Instant) {
        self.timer.reset(now);
        self.status = "Monitoring".to_string();
    }

    fn status(&self) -> String {
        self.status.clone()
    }

    fn manual_reset(&mut self, now: Instant) -> bool {
        self.timer.reset(now);
        self.status = "Timer reset".to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::landmarks::fixtures::neutral_face;

    fn input(now: Instant) -> DetectionInput<'static> {
        DetectionInput {
            face: None,
            hands: &[],
            frame_width: 640,
            frame_height: 480,
            now,
        }
    }

    #[test]
    fn test_fires_once_per_interval() {
        let t0 = Instant::now();
        let mut d = HydrationDetector::new(HydrationConfig { interval_minutes: 45 }, t0);
        assert!(!d.detect(&input(t0 + Duration::from_secs(45 * 60 - 1))).unwrap());
        assert!(d.detect(&input(t0 + Duration::from_secs(45 * 60))).unwrap());
        assert!(!d.detect(&input(t0 + Duration::from_secs(45 * 60 + 1))).unwrap());
        assert_eq!(d.status(), "Next reminder in 44m 59s");
    }

    #[test]
    fn test_fires_without_a_face() {
        let t0 = Instant::now();
        let mut d = HydrationDetector::new(HydrationConfig { interval_minutes: 1 }, t0);
        assert!(d.detect(&input(t0 + Duration::from_secs(60))).unwrap());
    }

    #[test]
    fn test_landmarks_are_ignored() {
        let t0 = Instant::now();
        let mut d = HydrationDetector::new(HydrationConfig { interval_minutes: 1 }, t0);
        let face = neutral_face();
        let with_face = DetectionInput {
            face: Some(&face),
            ..input(t0 + Duration::from_secs(30))
        };
        assert!(!d.detect(&with_face).unwrap());
    }

    #[test]
    fn test_manual_reset_postpones_reminder() {
        let t0 = Instant::now();
        let mut d = HydrationDetector::new(HydrationConfig { interval_minutes: 1 }, t0);
        assert!(d.manual_reset(t0 + Duration::from_secs(50)));
        assert_eq!(d.status(), "Timer reset");
        assert!(!d.detect(&input(t0 + Duration::from_secs(60))).unwrap());
        assert!(d.detect(&input(t0 + Duration::from_secs(110))).unwrap());
    }

    #[test]
    fn test_reset_recomputes_next_fire_from_reset_instant() {
        let t0 = Instant::now();
        let mut d = HydrationDetector::new(HydrationConfig { interval_minutes: 1 }, t0);
        let t1 = t0 + Duration::from_secs(600);
        d.reset(t1);
        assert!(!d.detect(&input(t1 + Duration::from_secs(59))).unwrap());
        assert!(d.detect(&input(t1 + Duration::from_secs(60))).unwrap());
    }
}
