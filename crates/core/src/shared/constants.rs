use std::time::Duration;

pub const DEFAULT_FPS: u32 = 30;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 720;

/// Downsampled preview resolution.
pub const PREVIEW_WIDTH: u32 = 320;
pub const PREVIEW_HEIGHT: u32 = 180;

/// Per-detector cooldown unless a detector overrides it.
pub const DEFAULT_DETECTOR_COOLDOWN: Duration = Duration::from_secs(60);

/// Cooldown applied by the dispatcher, keyed by detector id.
pub const DEFAULT_DISPATCH_COOLDOWN: Duration = Duration::from_secs(60);

/// How long `stop()` waits for the capture thread before giving up on it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// How long `start()` waits for the video source to report whether it opened.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

pub const NOTIFICATION_TITLE: &str = "Habit Monitor";

pub const SYSTEM_ALERT_ID: &str = "system";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
