use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detection::domain::counters::ConsecutiveCounter;
use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
use crate::detection::domain::landmarks::{
    FaceLandmarks, LEFT_MOUTH_CORNER, LOWER_LIP, RIGHT_MOUTH_CORNER, UPPER_LIP,
};

/// Mouth widths below this are treated as a degenerate mesh.
const MIN_MOUTH_WIDTH: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouthBreathingConfig {
    /// Mouth aspect ratio above which the mouth counts as open.
    pub mar_threshold: f64,
    /// Consecutive open frames before alerting (~4 s at 30 fps).
    pub frames_threshold: u32,
}

impl Default for MouthBreathingConfig {
    fn default() -> Self {
        Self {
            mar_threshold: 0.05,
            frames_threshold: 120,
        }
    }
}

/// Flags a mouth held open for a sustained run of frames.
pub struct MouthBreathingDetector {
    config: MouthBreathingConfig,
    counter: ConsecutiveCounter,
    status: String,
}

impl MouthBreathingDetector {
    pub fn new(config: MouthBreathingConfig) -> Self {
        let counter = ConsecutiveCounter::new(config.frames_threshold);
        Self {
            config,
            counter,
            status: "Monitoring".to_string(),
        }
    }

    /// Lip gap over mouth width; 0 when the width is degenerate.
    pub fn mouth_aspect_ratio(face: &FaceLandmarks) -> f64 {
        let vertical = (face.point(UPPER_LIP).y - face.point(LOWER_LIP).y).abs();
        let horizontal = (face.point(RIGHT_MOUTH_CORNER).x - face.point(LEFT_MOUTH_CORNER).x).abs();
        if horizontal < MIN_MOUTH_WIDTH {
            return 0.0;
        }
        vertical / horizontal
    }
}

impl Detector for MouthBreathingDetector {
    fn id(&self) -> &'static str {
        "mouth_breathing"
    }

    fn name(&self) -> &'static str {
        "Mouth Breathing"
    }

    fn alert_message(&self) -> &'static str {
        "Close your mouth! Breathe through your nose."
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        let Some(face) = input.face else {
            self.status = "No face detected".to_string();
            self.counter.reset();
            return Ok(false);
        };

        let mar = Self::mouth_aspect_ratio(face);
        let open = mar > self.config.mar_threshold;
        let fired = self.counter.observe(open);

        self.status = if open {
            format!(
                "MOUTH OPEN (MAR:{mar:.3}) [{}/{}]",
                if fired { self.counter.threshold() } else { self.counter.count() },
                self.counter.threshold()
            )
        } else {
            format!("Mouth closed (MAR:{mar:.3})")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::landmarks::fixtures::{face_with, neutral_face};
    use crate::detection::domain::landmarks::Point;
    use approx::assert_relative_eq;

    fn open_mouth() -> FaceLandmarks {
        face_with(&[
            (UPPER_LIP, Point::new(0.5, 0.58)),
            (LOWER_LIP, Point::new(0.5, 0.62)),
        ])
    }

    fn input<'a>(face: Option<&'a FaceLandmarks>, now: Instant) -> DetectionInput<'a> {
        DetectionInput {
            face,
            hands: &[],
            frame_width: 640,
            frame_height: 480,
            now,
        }
    }

    fn detector(frames: u32) -> MouthBreathingDetector {
        MouthBreathingDetector::new(MouthBreathingConfig {
            mar_threshold: 0.05,
            frames_threshold: frames,
        })
    }

    #[test]
    fn test_mar_open_mouth() {
        // gap 0.04 over width 0.08
        assert_relative_eq!(
            MouthBreathingDetector::mouth_aspect_ratio(&open_mouth()),
            0.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_mar_degenerate_width_is_zero() {
        let face = face_with(&[
            (LEFT_MOUTH_CORNER, Point::new(0.5, 0.6)),
            (RIGHT_MOUTH_CORNER, Point::new(0.5005, 0.6)),
            (LOWER_LIP, Point::new(0.5, 0.7)),
        ]);
        assert_eq!(MouthBreathingDetector::mouth_aspect_ratio(&face), 0.0);
    }

    #[test]
    fn test_fires_on_threshold_frame_then_restarts() {
        let mut d = detector(120);
        let face = open_mouth();
        let now = Instant::now();
        for frame in 1..120 {
            assert!(!d.detect(&input(Some(&face), now)).unwrap(), "frame {frame}");
        }
        assert!(d.detect(&input(Some(&face), now)).unwrap());
        assert_eq!(d.counter.count(), 0);
        assert!(!d.detect(&input(Some(&face), now)).unwrap());
    }

    #[test]
    fn test_closed_mouth_resets_run() {
        let mut d = detector(3);
        let open = open_mouth();
        let closed = neutral_face();
        let now = Instant::now();
        d.detect(&input(Some(&open), now)).unwrap();
        d.detect(&input(Some(&open), now)).unwrap();
        d.detect(&input(Some(&closed), now)).unwrap();
        assert_eq!(d.counter.count(), 0);
        assert!(d.status().starts_with("Mouth closed"));
    }

    #[test]
    fn test_missing_face_resets_and_reports() {
        let mut d = detector(3);
        let open = open_mouth();
        let now = Instant::now();
        d.detect(&input(Some(&open), now)).unwrap();
        assert!(!d.detect(&input(None, now)).unwrap());
        assert_eq!(d.counter.count(), 0);
        assert_eq!(d.status(), "No face detected");
    }

    #[test]
    fn test_reset_clears_counter() {
        let mut d = detector(3);
        let open = open_mouth();
        let now = Instant::now();
        d.detect(&input(Some(&open), now)).unwrap();
        d.reset(now);
        assert_eq!(d.counter.count(), 0);
    }
}
