mod script;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use proctor_core::detection::domain::face_detector::FaceDetector;
use proctor_core::detection::domain::object_detector::ObjectDetector;
use proctor_core::detection::infrastructure::onnx_face_detector::{
    self, OnnxFaceDetector,
};
use proctor_core::detection::infrastructure::onnx_object_detector::{
    self, OnnxObjectDetector,
};
use proctor_core::identity::domain::embedding_provider::EmbeddingProvider;
use proctor_core::identity::infrastructure::onnx_face_embedder::OnnxFaceEmbedder;
use proctor_core::monitoring::domain::violation::ViolationEvent;
use proctor_core::monitoring::engine_config::EngineConfig;
use proctor_core::monitoring::infrastructure::recording_sink::RecordingSink;
use proctor_core::monitoring::infrastructure::threaded_monitor_runner::ThreadedMonitorRunner;
use proctor_core::monitoring::monitor_logger::StdoutMonitorLogger;
use proctor_core::monitoring::monitor_runner::{
    MonitorRunner, RunConfig, SessionClock, SessionSummary,
};
use proctor_core::monitoring::signal_fusion_engine::SignalFusionEngine;
use proctor_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL,
    OBJECT_MODEL_NAME,
};
use proctor_core::shared::model_resolver::{self, ModelSource};
use proctor_core::shared::stream_info::StreamInfo;
use proctor_core::video::domain::frame_source::FrameSource;
use proctor_core::video::domain::frame_writer::FrameWriter;
use proctor_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;
use proctor_core::video::infrastructure::image_sequence_writer::ImageSequenceWriter;

use script::Script;

/// Frame rate assumed for image folders when --fps is not given.
const DEFAULT_FPS: f64 = 30.0;

/// Proctoring violation detection over recorded exam sessions.
#[derive(Parser)]
#[command(name = "proctor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor a directory of camera frames with the ONNX models.
    Monitor(MonitorArgs),
    /// Replay a JSON script of detections without any models.
    Replay(ReplayArgs),
}

#[derive(Args)]
struct MonitorArgs {
    /// Directory of frames, played back in file-name order.
    frames_dir: PathBuf,

    /// Capture rate of the frames, used to timestamp them.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: f64,

    /// Use wall-clock time instead of frame index / fps.
    #[arg(long)]
    wall_clock: bool,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = onnx_face_detector::DEFAULT_CONFIDENCE)]
    face_confidence: f64,

    /// Face detection model (downloaded when omitted).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// COCO object detection model; looked up in the model cache when omitted.
    #[arg(long)]
    object_model: Option<PathBuf>,

    /// Face embedding model (downloaded when omitted).
    #[arg(long)]
    embedding_model: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct ReplayArgs {
    /// Script describing per-frame detections.
    script: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Engine config JSON (defaults to the per-user config when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Euclidean distance above which the face counts as a different person.
    #[arg(long)]
    identity_threshold: Option<f64>,

    /// Minimum seconds between object detector runs.
    #[arg(long)]
    object_interval: Option<f64>,

    /// Do not lock the identity reference automatically on the first face.
    #[arg(long)]
    no_auto_capture: bool,

    /// Write annotated frames to this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write the session report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

/// JSON document written by --report.
#[derive(Serialize)]
struct SessionReport<'a> {
    source: &'a Path,
    config: &'a EngineConfig,
    #[serde(flatten)]
    summary: &'a SessionSummary,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Monitor(args) => run_monitor(args),
        Command::Replay(args) => run_replay(args),
    }
}

fn run_monitor(args: MonitorArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_monitor(&args)?;
    let config = build_config(&args.common)?;

    let face_path = resolve_model(FACE_MODEL_NAME, Some(FACE_MODEL_URL), args.face_model.as_deref())?;
    let object_path = resolve_model(OBJECT_MODEL_NAME, None, args.object_model.as_deref())?;
    let embedding_path = resolve_model(
        EMBEDDING_MODEL_NAME,
        Some(EMBEDDING_MODEL_URL),
        args.embedding_model.as_deref(),
    )?;

    let face_detector: Box<dyn FaceDetector> =
        Box::new(OnnxFaceDetector::new(&face_path, args.face_confidence)?);
    let object_detector: Box<dyn ObjectDetector> = Box::new(OnnxObjectDetector::new(
        &object_path,
        onnx_object_detector::DEFAULT_CONFIDENCE,
    )?);
    let embedder: Box<dyn EmbeddingProvider> = Box::new(OnnxFaceEmbedder::new(&embedding_path)?);

    let mut source: Box<dyn FrameSource> = Box::new(ImageSequenceReader::new(Some(args.fps)));
    let info = source.open(&args.frames_dir)?;
    let clock = if args.wall_clock {
        SessionClock::WallClock
    } else {
        SessionClock::FixedRate(args.fps)
    };

    run_session(
        &args.frames_dir,
        source,
        &info,
        config,
        (face_detector, object_detector, embedder),
        clock,
        &args.common,
    )
}

fn run_replay(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args.common)?;
    let script = Script::load(&args.script)?;
    let info = script.stream_info(&args.script);
    let clock = SessionClock::FixedRate(script.fps);
    let providers = script.into_providers();

    run_session(
        &args.script,
        Box::new(providers.source),
        &info,
        config,
        (
            Box::new(providers.faces),
            Box::new(providers.objects),
            Box::new(providers.embedder),
        ),
        clock,
        &args.common,
    )
}

type Providers = (
    Box<dyn FaceDetector>,
    Box<dyn ObjectDetector>,
    Box<dyn EmbeddingProvider>,
);

fn run_session(
    input: &Path,
    source: Box<dyn FrameSource>,
    info: &StreamInfo,
    config: EngineConfig,
    providers: Providers,
    clock: SessionClock,
    common: &CommonArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let (faces, objects, embedder) = providers;
    let mut engine = SignalFusionEngine::new(config, faces, objects, embedder)?
        .with_logger(Box::new(StdoutMonitorLogger::default()));

    let writer = match common.output_dir {
        Some(ref dir) => {
            let mut writer = ImageSequenceWriter::new();
            writer.open(dir, info)?;
            Some(Box::new(writer) as Box<dyn FrameWriter>)
        }
        None => None,
    };
    let mut sink = RecordingSink::new(writer, Some(Box::new(print_event)));

    let total = info.total_frames;
    let mut run_config = RunConfig::new(clock);
    run_config.on_progress = Some(Box::new(move |current, _| {
        eprint!("\rProcessing frame {current}/{total}");
        true
    }));

    let summary =
        ThreadedMonitorRunner::new().run(source, info, &mut engine, &mut sink, run_config)?;
    eprintln!();

    print_counters(&summary);
    if let Some(ref dir) = common.output_dir {
        log::info!(
            "Wrote {} annotated frame(s) to {}",
            sink.frames_written(),
            dir.display()
        );
    }
    if let Some(ref path) = common.report {
        write_report(path, input, engine.config(), &summary)?;
        log::info!("Session report written to {}", path.display());
    }
    Ok(())
}

fn build_config(common: &CommonArgs) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match common.config {
        Some(ref path) => EngineConfig::load(path)?,
        None => match EngineConfig::user_config_path().filter(|p| p.exists()) {
            Some(path) => {
                log::info!("Using config {}", path.display());
                EngineConfig::load(&path)?
            }
            None => EngineConfig::default(),
        },
    };
    apply_overrides(&mut config, common);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut EngineConfig, common: &CommonArgs) {
    if let Some(threshold) = common.identity_threshold {
        config.identity_threshold = threshold;
    }
    if let Some(interval) = common.object_interval {
        config.object_refresh_interval_secs = interval;
    }
    if common.no_auto_capture {
        config.auto_capture_reference = false;
    }
}

fn validate_monitor(args: &MonitorArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.frames_dir.is_dir() {
        return Err(format!("Frames directory not found: {}", args.frames_dir.display()).into());
    }
    if !(args.fps.is_finite() && args.fps > 0.0) {
        return Err(format!("Frame rate must be positive, got {}", args.fps).into());
    }
    if !(0.0..=1.0).contains(&args.face_confidence) {
        return Err(format!(
            "Face confidence must be between 0.0 and 1.0, got {}",
            args.face_confidence
        )
        .into());
    }
    Ok(())
}

fn resolve_model(
    name: &str,
    url: Option<&str>,
    override_path: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {name}");
    let source = ModelSource {
        name,
        url,
        override_path,
        bundled_dir: None,
    };
    let path = model_resolver::resolve(&source, Some(Box::new(download_progress)))?;
    Ok(path)
}

fn write_report(
    path: &Path,
    input: &Path,
    config: &EngineConfig,
    summary: &SessionSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = SessionReport {
        source: input,
        config,
        summary,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn print_event(event: &ViolationEvent) {
    eprintln!();
    println!(
        "[{:>8.2}s] {:?} {}",
        event.timestamp.as_secs_f64(),
        event.severity,
        event.message
    );
}

fn print_counters(summary: &SessionSummary) {
    let status = if summary.cancelled { " (stopped)" } else { "" };
    println!(
        "{} frame(s), {:.1}s of session{status}",
        summary.frames_processed,
        summary.session_duration.as_secs_f64()
    );
    for (kind, count) in summary.counters.iter() {
        println!("  {:<20} {count}", kind.message());
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common() -> CommonArgs {
        CommonArgs {
            config: None,
            identity_threshold: None,
            object_interval: None,
            no_auto_capture: false,
            output_dir: None,
            report: None,
        }
    }

    #[test]
    fn test_cli_parses_monitor() {
        let cli = Cli::try_parse_from([
            "proctor",
            "monitor",
            "frames",
            "--fps",
            "15",
            "--identity-threshold",
            "0.8",
            "--no-auto-capture",
        ])
        .unwrap();
        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.fps, 15.0);
                assert_eq!(args.common.identity_threshold, Some(0.8));
                assert!(args.common.no_auto_capture);
                assert!(!args.wall_clock);
            }
            Command::Replay(_) => panic!("expected monitor"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["proctor"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_defaults() {
        let mut config = EngineConfig::default();
        let args = CommonArgs {
            identity_threshold: Some(0.7),
            object_interval: Some(1.5),
            no_auto_capture: true,
            ..common()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.identity_threshold, 0.7);
        assert_eq!(config.object_refresh_interval_secs, 1.5);
        assert!(!config.auto_capture_reference);
    }

    #[test]
    fn test_build_config_reads_file_and_rejects_invalid_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"identity_threshold": 0.5}"#).unwrap();

        let args = CommonArgs {
            config: Some(path.clone()),
            ..common()
        };
        assert_eq!(build_config(&args).unwrap().identity_threshold, 0.5);

        let bad = CommonArgs {
            config: Some(path),
            object_interval: Some(0.0),
            ..common()
        };
        assert!(build_config(&bad).is_err());
    }

    #[test]
    fn test_validate_monitor_rejects_missing_dir() {
        let args = MonitorArgs {
            frames_dir: PathBuf::from("/nonexistent/frames"),
            fps: 30.0,
            wall_clock: false,
            face_confidence: 0.25,
            face_model: None,
            object_model: None,
            embedding_model: None,
            common: common(),
        };
        assert!(validate_monitor(&args).is_err());
    }

    #[test]
    fn test_replay_session_writes_report_and_frames() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("session.json");
        // Two faces for the first 2s of a 3s session at 10 fps
        let frames: Vec<String> = (0..20)
            .map(|i| {
                format!(
                    r#"{{"index": {i}, "faces": [{face1}, {face2}]}}"#,
                    face1 = face_json(20.0),
                    face2 = face_json(120.0)
                )
            })
            .collect();
        let script = format!(
            r#"{{"width": 200, "height": 100, "fps": 10.0, "frame_count": 30, "frames": [{}]}}"#,
            frames.join(",")
        );
        std::fs::write(&script_path, script).unwrap();

        let out_dir = dir.path().join("annotated");
        let report_path = dir.path().join("report.json");
        let args = ReplayArgs {
            script: script_path,
            common: CommonArgs {
                config: Some(write_default_config(dir.path())),
                output_dir: Some(out_dir.clone()),
                report: Some(report_path.clone()),
                ..common()
            },
        };
        run_replay(args).unwrap();

        assert!(out_dir.join("frame_000029.png").exists());
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report["frames_processed"], 30);
        assert_eq!(report["counters"]["multiple_faces"], 1);
        assert_eq!(report["events"][0]["kind"], "multiple_faces");
    }

    fn face_json(x: f64) -> String {
        format!(
            r#"{{"bbox": {{"x1": {x}, "y1": 20.0, "x2": {x2}, "y2": 80.0}}, "confidence": 0.9,
               "landmarks": {{"points": [[{ex1}, 40.0], [{ex2}, 40.0], [{nx}, 50.0], [{ex1}, 60.0], [{ex2}, 60.0]]}}}}"#,
            x2 = x + 50.0,
            ex1 = x + 15.0,
            ex2 = x + 35.0,
            nx = x + 25.0
        )
    }

    /// Keeps the test independent of any per-user config on the machine.
    fn write_default_config(dir: &Path) -> PathBuf {
        let path = dir.join("engine.json");
        std::fs::write(&path, serde_json::to_string(&EngineConfig::default()).unwrap()).unwrap();
        path
    }
}
