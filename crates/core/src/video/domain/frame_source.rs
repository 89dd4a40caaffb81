use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Reads frames from a camera recording or image source.
///
/// Implementations handle decoding while the monitor works with the abstract
/// `Frame` and `StreamInfo` types.
pub trait FrameSource: Send {
    /// Opens the source and returns its stream description.
    fn open(&mut self, path: &Path) -> Result<StreamInfo, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
