use std::path::Path;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("frame buffer does not match {width}x{height} RGB")]
    BadFrame { width: u32, height: u32 },
    #[error("could not encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persists a preview frame so something outside the process can show it.
pub trait SnapshotWriter: Send {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), SnapshotError>;
}
