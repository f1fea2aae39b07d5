use std::time::Instant;

use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
use crate::shared::alert::{Alert, Severity};

const STATUS_DISABLED: &str = "Disabled";

/// A detector plus the lifecycle every detector shares: enablement and its
/// own alert cooldown.
///
/// The registry keeps each one behind a mutex, so enable/disable can never
/// interleave with an in-flight `detect`.
pub struct MonitoredDetector {
    detector: Box<dyn Detector>,
    enabled: bool,
    last_alert: Option<Instant>,
}

impl MonitoredDetector {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        Self {
            detector,
            enabled: false,
            last_alert: None,
        }
    }

    pub fn id(&self) -> &'static str {
        self.detector.id()
    }

    pub fn name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self, now: Instant) {
        self.enabled = true;
        self.detector.reset(now);
    }

    pub fn disable(&mut self, now: Instant) {
        self.enabled = false;
        self.detector.reset(now);
    }

    /// Runs the detector. Disabled detectors report nothing.
    pub fn detect(&mut self, input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
        if !self.enabled {
            return Ok(false);
        }
        self.detector.detect(input)
    }

    /// True when this detector has never alerted or its cooldown has elapsed.
    pub fn should_alert(&self, now: Instant) -> bool {
        match self.last_alert {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.detector.cooldown(),
        }
    }

    pub fn mark_alerted(&mut self, now: Instant) {
        self.last_alert = Some(now);
    }

    pub fn build_alert(&self) -> Alert {
        Alert::new(
            self.detector.id(),
            self.detector.alert_message(),
            self.detector.severity(),
        )
    }

    pub fn severity(&self) -> Severity {
        self.detector.severity()
    }

    pub fn manual_reset(&mut self, now: Instant) -> bool {
        self.detector.manual_reset(now)
    }

    pub fn status(&self) -> String {
        if self.enabled {
            self.detector.status()
        } else {
            STATUS_DISABLED.to_string()
        }
    }
}
