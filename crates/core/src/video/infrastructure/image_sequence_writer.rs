use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_writer::FrameWriter;

/// Writes each frame as `frame_NNNNNN.png` into an output directory using
/// the `image` crate.
pub struct ImageSequenceWriter {
    dir: Option<PathBuf>,
    written: usize,
}

impl ImageSequenceWriter {
    pub fn new() -> Self {
        Self {
            dir: None,
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn file_name(index: usize) -> String {
        format!("frame_{index:06}.png")
    }
}

impl Default for ImageSequenceWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter for ImageSequenceWriter {
    fn open(&mut self, path: &Path, _info: &StreamInfo) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(path)?;
        self.dir = Some(path.to_path_buf());
        self.written = 0;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let dir = self.dir.as_ref().ok_or("ImageSequenceWriter: not opened")?;
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;
        img.save(dir.join(Self::file_name(frame.index())))?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = self.dir.take() {
            log::debug!("Wrote {} frame(s) to {}", self.written, dir.display());
        }
        Ok(())
    }
}
