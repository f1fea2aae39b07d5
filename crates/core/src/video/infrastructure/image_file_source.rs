use std::path::PathBuf;

use crate::shared::frame::Frame;
use crate::video::domain::video_source::{CaptureError, SourceInfo, VideoSource};

/// Serves one still image as an endless stream of identical frames.
///
/// Lets the pipeline run headless (demos, CI) without a camera.
pub struct ImageFileSource {
    path: PathBuf,
    frame: Option<Frame>,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
        }
    }
}

impl VideoSource for ImageFileSource {
    fn open(&mut self) -> Result<SourceInfo, CaptureError> {
        let rgb = image::open(&self.path)
            .map_err(|e| CaptureError::SourceOpen(format!("{}: {e}", self.path.display())))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        self.frame = Some(Frame::new(rgb.into_raw(), width, height, 3, 0));
        log::info!("Opened still image {} ({width}x{height})", self.path.display());

        Ok(SourceInfo {
            width,
            height,
            fps: 0.0,
            description: self.path.display().to_string(),
        })
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        self.frame
            .clone()
            .ok_or_else(|| CaptureError::Read("image source not opened".into()))
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
