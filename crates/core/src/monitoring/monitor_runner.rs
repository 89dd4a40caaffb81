use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monitoring::domain::violation::{duration_secs, Counters, ViolationEvent};
use crate::monitoring::domain::violation_sink::ViolationSink;
use crate::monitoring::signal_fusion_engine::SignalFusionEngine;
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_source::FrameSource;

/// Where session timestamps come from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionClock {
    /// Monotonic time since the first frame arrived. For live cameras.
    WallClock,
    /// `frame.index / fps`. For recordings, so results do not depend on
    /// processing speed.
    FixedRate(f64),
}

/// Configuration for one monitoring run.
pub struct RunConfig {
    pub clock: SessionClock,
    /// Called after every frame with `(frames_processed, total_frames)`;
    /// returning `false` stops the session.
    pub on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    pub cancelled: Arc<AtomicBool>,
}

impl RunConfig {
    pub fn new(clock: SessionClock) -> Self {
        Self {
            clock,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// What a finished (or stopped) session produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub frames_processed: usize,
    #[serde(with = "duration_secs")]
    pub session_duration: Duration,
    pub counters: Counters,
    pub events: Vec<ViolationEvent>,
    pub cancelled: bool,
}

/// Abstracts how the read → process → sink loop is executed.
///
/// This is a port; infrastructure provides concrete implementations. The
/// source must already be opened, `info` is what `open` returned.
pub trait MonitorRunner: Send {
    fn run(
        &self,
        source: Box<dyn FrameSource>,
        info: &StreamInfo,
        engine: &mut SignalFusionEngine,
        sink: &mut dyn ViolationSink,
        config: RunConfig,
    ) -> Result<SessionSummary, Box<dyn std::error::Error>>;
}
