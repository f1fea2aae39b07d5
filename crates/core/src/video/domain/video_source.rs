use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("could not open video source: {0}")]
    SourceOpen(String),
    #[error("frame read failed: {0}")]
    Read(String),
    #[error("capture thread failed: {0}")]
    Thread(String),
    #[error("timed out waiting for the video source to open")]
    StartTimeout,
}

/// What an opened source reports about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Native rate reported by the device, `0.0` when unknown.
    pub fps: f64,
    pub description: String,
}

/// A live stream of frames: a camera, a network stream, or a stand-in.
///
/// Sources are built on the capture thread from a factory and never leave
/// it, so implementations may wrap thread-bound native handles.
pub trait VideoSource {
    /// Acquires the device. Called once before any read.
    fn open(&mut self) -> Result<SourceInfo, CaptureError>;

    /// Blocks until the next frame is available. The returned frame's
    /// timestamp is overwritten by the capture loop.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self);
}

/// Builds a fresh source for each capture run.
pub type SourceFactory = std::sync::Arc<dyn Fn() -> Box<dyn VideoSource> + Send + Sync>;
