use std::time::{Duration, Instant};

use thiserror::Error;

use crate::detection::domain::landmarks::{FaceLandmarks, HandLandmarks};
use crate::shared::alert::Severity;
use crate::shared::constants::DEFAULT_DETECTOR_COOLDOWN;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("landmark {index} is missing")]
    MissingLandmark { index: usize },
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Per-frame input shared by every detector.
///
/// Both landmark kinds are always passed; detectors that do not need hands
/// ignore them.
#[derive(Clone, Copy, Debug)]
pub struct DetectionInput<'a> {
    pub face: Option<&'a FaceLandmarks>,
    pub hands: &'a [HandLandmarks],
    pub frame_width: u32,
    pub frame_height: u32,
    pub now: Instant,
}

impl<'a> DetectionInput<'a> {
    pub fn hands(&self) -> Option<&'a [HandLandmarks]> {
        if self.hands.is_empty() {
            None
        } else {
            Some(self.hands)
        }
    }
}

/// One behavioural rule and its rolling state.
///
/// Implementations never perform I/O and never look at pixels. Enablement
/// and alert cooldown are handled by
/// [`MonitoredDetector`](crate::detection::domain::monitored_detector::MonitoredDetector).
pub trait Detector: Send {
    /// Stable registry key, e.g. `"blink_rate"`.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn alert_message(&self) -> &'static str;

    fn severity(&self) -> Severity {
        Severity::Normal
    }

    fn cooldown(&self) -> Duration {
        DEFAULT_DETECTOR_COOLDOWN
    }

    /// Returns true when the unhealthy condition is judged present this frame.
    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError>;

    /// Clears all rolling state as of `now`.
    fn reset(&mut self, now: Instant);

    fn status(&self) -> String;

    /// User acknowledgement (e.g. "I just drank water"). Returns false when
    /// the detector has nothing to reset.
    fn manual_reset(&mut self, _now: Instant) -> bool {
        false
    }
}
