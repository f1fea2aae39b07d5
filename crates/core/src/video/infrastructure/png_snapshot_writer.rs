use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::video::domain::snapshot_writer::{SnapshotError, SnapshotWriter};

/// Writes snapshots as PNG through a sibling temp file and a rename, so a
/// viewer polling the path never reads a half-written image.
pub struct PngSnapshotWriter {
    scale_to: Option<(u32, u32)>,
}

impl PngSnapshotWriter {
    pub fn new() -> Self {
        Self { scale_to: None }
    }

    /// Resizes every snapshot to the given size before encoding.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.scale_to = Some((width, height));
        self
    }
}

impl Default for PngSnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl SnapshotWriter for PngSnapshotWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or(SnapshotError::BadFrame {
                width: frame.width(),
                height: frame.height(),
            })?;
        let img = match self.scale_to {
            Some((w, h)) if (w, h) != img.dimensions() => {
                image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle)
            }
            _ => img,
        };

        let tmp = temp_path(path);
        img.save_with_format(&tmp, image::ImageFormat::Png)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_png_and_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview").join("latest.png");
        PngSnapshotWriter::new()
            .write(&path, &Frame::filled(32, 18, [50, 100, 200]))
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (32, 18));
        assert_eq!(img.get_pixel(0, 0).0, [50, 100, 200]);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        let writer = PngSnapshotWriter::new();
        writer.write(&path, &Frame::filled(8, 8, [0, 0, 0])).unwrap();
        writer.write(&path, &Frame::filled(8, 8, [255, 255, 255])).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(4, 4).0, [255, 255, 255]);
    }

    #[test]
    fn test_resizes_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumb.png");
        PngSnapshotWriter::new()
            .with_size(64, 36)
            .write(&path, &Frame::filled(320, 180, [128, 128, 128]))
            .unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (64, 36));
    }
}
