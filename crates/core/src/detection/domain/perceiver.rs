use thiserror::Error;

use crate::detection::domain::landmarks::LandmarkSet;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("failed to read landmark source: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed landmark record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("perception backend failed: {0}")]
    Backend(String),
}

/// Turns a frame into face and hand landmarks.
///
/// Called once per captured frame, always from the capture thread.
/// Implementations may smooth over time, so `frame.timestamp_ms()` must be
/// strictly increasing across calls on one instance.
pub trait Perceiver: Send {
    fn perceive(&mut self, frame: &Frame) -> Result<LandmarkSet, PerceptionError>;
}

/// Perceiver that never finds a face or hands.
///
/// Useful when only landmark-independent detectors (hydration) are wanted,
/// and in tests.
pub struct AbsentPerceiver;

impl Perceiver for AbsentPerceiver {
    fn perceive(&mut self, _frame: &Frame) -> Result<LandmarkSet, PerceptionError> {
        Ok(LandmarkSet::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_perceiver_reports_nothing() {
        let mut perceiver = AbsentPerceiver;
        let set = perceiver.perceive(&Frame::filled(4, 4, [0, 0, 0])).unwrap();
        assert_eq!(set, LandmarkSet::empty());
    }
}
