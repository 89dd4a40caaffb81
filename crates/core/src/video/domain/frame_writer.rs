use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Persists annotated frames so a session can be reviewed afterwards.
pub trait FrameWriter: Send {
    fn open(&mut self, path: &Path, info: &StreamInfo) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
