use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::constants::SYSTEM_ALERT_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Normal => write!(f, "normal"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// An alert raised by a detector (or by the pipeline itself) awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub detector_id: String,
    pub message: String,
    pub severity: Severity,
}

impl Alert {
    pub fn new(detector_id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            detector_id: detector_id.into(),
            message: message.into(),
            severity,
        }
    }

    /// Pipeline-level alert, e.g. the camera could not be opened.
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(SYSTEM_ALERT_ID, message, Severity::High)
    }

    pub fn is_system(&self) -> bool {
        self.detector_id == SYSTEM_ALERT_ID
    }
}
