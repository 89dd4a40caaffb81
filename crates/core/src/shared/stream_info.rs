use std::path::PathBuf;

/// Description of a frame stream, known once the source is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate; `None` for sources without timing (image folders).
    pub fps: Option<f64>,
    /// 0 when the length is unknown (live cameras).
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

impl StreamInfo {
    /// Session time of frame `index` at the nominal rate.
    pub fn timestamp_of(&self, index: usize) -> Option<std::time::Duration> {
        self.fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| std::time::Duration::from_secs_f64(index as f64 / fps))
    }
}
