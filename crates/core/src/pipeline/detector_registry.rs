use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::detection::domain::detector::{DetectionInput, Detector};
use crate::detection::domain::landmarks::LandmarkSet;
use crate::detection::domain::monitored_detector::MonitoredDetector;
use crate::detection::domain::perceiver::Perceiver;
use crate::shared::alert::Alert;
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown detector: {0}")]
    UnknownDetector(String),
    #[error("detector {0} has no manual reset")]
    ResetUnsupported(String),
}

/// Landmarks and alerts produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub landmarks: LandmarkSet,
    pub alerts: Vec<Alert>,
}

/// Owns the fixed set of detectors and the perceiver, and fans each frame
/// out to the enabled detectors.
///
/// Every detector sits behind its own mutex: the control surface can toggle
/// one detector while the capture thread is evaluating another, and never
/// observes a half-updated detector.
pub struct DetectorRegistry {
    detectors: Vec<(&'static str, Mutex<MonitoredDetector>)>,
    perceiver: Mutex<Box<dyn Perceiver>>,
    clock: Arc<dyn Clock>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking detector is already contained; keep serving its mutex.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl DetectorRegistry {
    /// Detectors start disabled. Ids must be unique; later duplicates are
    /// dropped with a warning.
    pub fn new(
        detectors: Vec<Box<dyn Detector>>,
        perceiver: Box<dyn Perceiver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut entries: Vec<(&'static str, Mutex<MonitoredDetector>)> = Vec::new();
        for detector in detectors {
            let id = detector.id();
            if entries.iter().any(|(existing, _)| *existing == id) {
                log::warn!("Duplicate detector id {id}, ignoring");
                continue;
            }
            entries.push((id, Mutex::new(MonitoredDetector::new(detector))));
        }
        Self {
            detectors: entries,
            perceiver: Mutex::new(perceiver),
            clock,
        }
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|(id, _)| *id).collect()
    }

    fn entry(&self, id: &str) -> Result<&Mutex<MonitoredDetector>, RegistryError> {
        self.detectors
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, d)| d)
            .ok_or_else(|| RegistryError::UnknownDetector(id.to_string()))
    }

    pub fn enable(&self, id: &str) -> Result<(), RegistryError> {
        let now = self.clock.now();
        lock(self.entry(id)?).enable(now);
        log::info!("Enabled detector {id}");
        Ok(())
    }

    pub fn disable(&self, id: &str) -> Result<(), RegistryError> {
        let now = self.clock.now();
        lock(self.entry(id)?).disable(now);
        log::info!("Disabled detector {id}");
        Ok(())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.entry(id).map(|d| lock(d).is_enabled()).unwrap_or(false)
    }

    pub fn any_enabled(&self) -> bool {
        self.detectors.iter().any(|(_, d)| lock(d).is_enabled())
    }

    pub fn enabled_ids(&self) -> BTreeSet<String> {
        self.detectors
            .iter()
            .filter(|(_, d)| lock(d).is_enabled())
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Human-readable status of every detector, enabled or not.
    pub fn statuses(&self) -> BTreeMap<String, String> {
        self.detectors
            .iter()
            .map(|(id, d)| (id.to_string(), lock(d).status()))
            .collect()
    }

    /// Manual acknowledgement for detectors that support it (hydration).
    pub fn reset_detector(&self, id: &str) -> Result<(), RegistryError> {
        let now = self.clock.now();
        if lock(self.entry(id)?).manual_reset(now) {
            Ok(())
        } else {
            Err(RegistryError::ResetUnsupported(id.to_string()))
        }
    }

    /// Runs perception once on the frame, then every enabled detector.
    ///
    /// Returns `None` when perception fails; the frame is skipped.
    pub fn process_frame(&self, frame: &Frame) -> Option<FrameOutcome> {
        let landmarks = self.perceive(frame)?;
        let alerts = self.process(&landmarks, frame.width(), frame.height());
        Some(FrameOutcome { landmarks, alerts })
    }

    /// Runs only the perception step. `None` means the frame should be skipped.
    pub fn perceive(&self, frame: &Frame) -> Option<LandmarkSet> {
        match lock(&self.perceiver).perceive(frame) {
            Ok(landmarks) => Some(landmarks),
            Err(e) => {
                log::debug!("Perception failed at {}ms: {e}", frame.timestamp_ms());
                None
            }
        }
    }

    /// Evaluates every enabled detector against one frame's landmarks.
    ///
    /// A detector that errors or panics counts as "no detection" for this
    /// frame; the remaining detectors still run.
    pub fn process(
        &self,
        landmarks: &LandmarkSet,
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<Alert> {
        let now = self.clock.now();
        let input = DetectionInput {
            face: landmarks.face.as_ref(),
            hands: &landmarks.hands,
            frame_width,
            frame_height,
            now,
        };

        let mut alerts = Vec::new();
        for (id, entry) in &self.detectors {
            let mut detector = lock(entry);
            if !detector.is_enabled() {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&input)));
            let detected = match result {
                Ok(Ok(detected)) => detected,
                Ok(Err(e)) => {
                    log::warn!("Detector {id} failed: {e}");
                    false
                }
                Err(_) => {
                    log::warn!("Detector {id} panicked; skipping this frame");
                    false
                }
            };

            if detected && detector.should_alert(now) {
                detector.mark_alerted(now);
                alerts.push(detector.build_alert());
            }
        }
        alerts
    }
}
