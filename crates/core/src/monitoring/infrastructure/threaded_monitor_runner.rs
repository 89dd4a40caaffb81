use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::monitoring::domain::violation_sink::ViolationSink;
use crate::monitoring::monitor_runner::{MonitorRunner, RunConfig, SessionClock, SessionSummary};
use crate::monitoring::signal_fusion_engine::SignalFusionEngine;
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_source::FrameSource;

const DEFAULT_CHANNEL_CAPACITY: usize = 4;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Runs frame acquisition on a dedicated thread and the engine on the
/// calling thread.
///
/// Layout: `reader → bounded channel → main [process → sink]`
///
/// The bounded channel lets decoding overlap with detection while keeping
/// memory flat when the engine is the bottleneck.
pub struct ThreadedMonitorRunner {
    channel_capacity: usize,
}

impl ThreadedMonitorRunner {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for ThreadedMonitorRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorRunner for ThreadedMonitorRunner {
    fn run(
        &self,
        source: Box<dyn FrameSource>,
        info: &StreamInfo,
        engine: &mut SignalFusionEngine,
        sink: &mut dyn ViolationSink,
        config: RunConfig,
    ) -> Result<SessionSummary, Box<dyn std::error::Error>> {
        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<Result<Frame, SendError>>(self.channel_capacity);
        let reader_handle = spawn_reader(source, frame_tx, config.cancelled.clone());

        let result = run_main_loop(&frame_rx, info, engine, sink, &config);

        // Unblocks a reader waiting on a full channel.
        drop(frame_rx);
        let reader_joined = reader_handle.join();

        // The source is closed even when the main loop failed.
        let reader_panicked = match reader_joined {
            Ok(mut source) => {
                source.close();
                false
            }
            Err(_) => true,
        };
        let mut summary = result?;
        if reader_panicked {
            return Err("Reader thread panicked".into());
        }

        sink.finish()?;
        engine.logger().summary();
        summary.counters = engine.counters().clone();
        Ok(summary)
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    frame_tx: crossbeam_channel::Sender<Result<Frame, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> std::thread::JoinHandle<Box<dyn FrameSource>> {
    std::thread::spawn(move || {
        for frame_result in source.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() {
                break;
            }
        }
        source
    })
}

/// Receives frames, processes them and hands each result to the sink.
fn run_main_loop(
    frame_rx: &crossbeam_channel::Receiver<Result<Frame, SendError>>,
    info: &StreamInfo,
    engine: &mut SignalFusionEngine,
    sink: &mut dyn ViolationSink,
    config: &RunConfig,
) -> Result<SessionSummary, Box<dyn std::error::Error>> {
    let mut summary = SessionSummary {
        frames_processed: 0,
        session_duration: Duration::ZERO,
        counters: engine.counters().clone(),
        events: Vec::new(),
        cancelled: false,
    };
    let mut started: Option<Instant> = None;

    for frame_result in frame_rx {
        if config.cancelled.load(Ordering::Relaxed) {
            summary.cancelled = true;
            break;
        }

        let frame = frame_result.map_err(|e| -> Box<dyn std::error::Error> { e.to_string().into() })?;
        let now = match config.clock {
            SessionClock::WallClock => started.get_or_insert_with(Instant::now).elapsed(),
            SessionClock::FixedRate(fps) if fps > 0.0 => {
                Duration::from_secs_f64(frame.index() as f64 / fps)
            }
            SessionClock::FixedRate(fps) => {
                return Err(format!("Invalid frame rate: {fps}").into());
            }
        };

        let processed = engine.process(&frame, now)?;
        sink.on_frame(&processed.annotated, &processed.report)?;
        summary.events.extend(processed.report.events);
        summary.frames_processed += 1;
        summary.session_duration = now;

        engine
            .logger_mut()
            .progress(summary.frames_processed, info.total_frames);

        if let Some(ref callback) = config.on_progress {
            if !callback(summary.frames_processed, info.total_frames) {
                config.cancelled.store(true, Ordering::Relaxed);
                summary.cancelled = true;
                break;
            }
        }
    }

    summary.cancelled |= config.cancelled.load(Ordering::Relaxed);
    Ok(summary)
}
