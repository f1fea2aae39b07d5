use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::alert_dispatcher::DispatchConfig;
use crate::detection::domain::detector::Detector;
use crate::detection::domain::perceiver::Perceiver;
use crate::detection::infrastructure::blink_rate_detector::{BlinkRateConfig, BlinkRateDetector};
use crate::detection::infrastructure::eye_rubbing_detector::{
    EyeRubbingConfig, EyeRubbingDetector,
};
use crate::detection::infrastructure::face_touching_detector::{
    FaceTouchingConfig, FaceTouchingDetector,
};
use crate::detection::infrastructure::focus_detector::{FocusConfig, FocusDetector};
use crate::detection::infrastructure::hydration_detector::{HydrationConfig, HydrationDetector};
use crate::detection::infrastructure::mouth_breathing_detector::{
    MouthBreathingConfig, MouthBreathingDetector,
};
use crate::pipeline::capture_loop::CaptureConfig;
use crate::pipeline::detector_registry::DetectorRegistry;
use crate::pipeline::habit_monitor::MonitorConfig;
use crate::preview::annotation::OverlayGeometry;
use crate::shared::clock::Clock;
use crate::shared::constants::{
    DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_DISPATCH_COOLDOWN, DEFAULT_FPS,
    NOTIFICATION_TITLE,
};

/// Every detector the monitor knows, in registry order.
pub const DETECTOR_IDS: [&str; 6] = [
    "mouth_breathing",
    "blink_rate",
    "eye_rubbing",
    "face_touching",
    "hydration",
    "focus",
];

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings file could not be read or written: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no per-user config directory on this platform")]
    NoConfigDir,
    #[error("unknown detector in settings: {0}")]
    UnknownDetector(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub mouth_breathing: MouthBreathingConfig,
    pub blink_rate: BlinkRateConfig,
    pub eye_rubbing: EyeRubbingConfig,
    pub face_touching: FaceTouchingConfig,
    pub hydration: HydrationConfig,
    pub focus: FocusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub fps: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub mirror: bool,
    pub cooldown_secs: u64,
    pub notifications_enabled: bool,
    pub audio_enabled: bool,
    /// Detectors switched on at startup.
    pub enabled_detectors: Vec<String>,
    pub detectors: DetectorSettings,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            capture_width: DEFAULT_CAPTURE_WIDTH,
            capture_height: DEFAULT_CAPTURE_HEIGHT,
            mirror: true,
            cooldown_secs: DEFAULT_DISPATCH_COOLDOWN.as_secs(),
            notifications_enabled: true,
            audio_enabled: true,
            enabled_detectors: Vec::new(),
            detectors: DetectorSettings::default(),
        }
    }
}

impl MonitorSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("HabitMonitor").join("settings.json"))
    }

    /// Loads the per-user settings, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        match self
            .enabled_detectors
            .iter()
            .find(|id| !DETECTOR_IDS.contains(&id.as_str()))
        {
            Some(unknown) => Err(SettingsError::UnknownDetector(unknown.clone())),
            None => Ok(()),
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        let d = &self.detectors;
        CaptureConfig {
            fps: self.fps.max(1),
            overlay: OverlayGeometry::from_configs(
                &d.mouth_breathing,
                &d.eye_rubbing,
                &d.face_touching,
            ),
            ..CaptureConfig::default()
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            cooldown: Duration::from_secs(self.cooldown_secs),
            title: NOTIFICATION_TITLE.to_string(),
            notifications_enabled: self.notifications_enabled,
            audio_enabled: self.audio_enabled,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            capture: self.capture_config(),
            dispatch: self.dispatch_config(),
        }
    }

    /// Builds the six detectors from their threshold blocks. All start
    /// disabled; enabling is the caller's move.
    pub fn build_registry(
        &self,
        perceiver: Box<dyn Perceiver>,
        clock: Arc<dyn Clock>,
    ) -> DetectorRegistry {
        let now = clock.now();
        let d = &self.detectors;
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(MouthBreathingDetector::new(d.mouth_breathing.clone())),
            Box::new(BlinkRateDetector::new(d.blink_rate.clone(), now)),
            Box::new(EyeRubbingDetector::new(d.eye_rubbing.clone())),
            Box::new(FaceTouchingDetector::new(d.face_touching.clone())),
            Box::new(HydrationDetector::new(d.hydration.clone(), now)),
            Box::new(FocusDetector::new(d.focus.clone())),
        ];
        DetectorRegistry::new(detectors, perceiver, clock)
    }
}
