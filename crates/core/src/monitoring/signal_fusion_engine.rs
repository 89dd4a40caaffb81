use std::time::{Duration, Instant};

use thiserror::Error;

use crate::detection::domain::detected_face::{primary_face, DetectedFace};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::object_detector::{DetectedObject, ObjectClass, ObjectDetector};
use crate::detection::infrastructure::throttled_object_detector::ThrottledObjectDetector;
use crate::identity::domain::embedding_provider::EmbeddingProvider;
use crate::identity::domain::identity_verifier::{IdentityCheck, IdentityVerifier};
use crate::monitoring::domain::overlay::{
    Overlay, OverlayPrimitive, Rgb, BLUE, BOX_THICKNESS, GREEN, LANDMARK_RADIUS, RED, YELLOW,
};
use crate::monitoring::domain::status_report::StatusReport;
use crate::monitoring::domain::violation::{
    Counters, Triggers, ViolationEvent, ViolationKind,
};
use crate::monitoring::domain::violation_tracker::ViolationTracker;
use crate::monitoring::engine_config::{ConfigError, EngineConfig};
use crate::monitoring::monitor_logger::{MonitorLogger, NullMonitorLogger};
use crate::shared::frame::Frame;

const HUD_X: f64 = 10.0;
const HUD_FIRST_LINE_Y: f64 = 28.0;
const HUD_LINE_SPACING: f64 = 28.0;
/// Identity text sits this far above the primary face box.
const IDENTITY_TEXT_OFFSET: f64 = 20.0;

#[derive(Error, Debug, PartialEq)]
pub enum MonitorError {
    #[error("malformed frame: {width}x{height} with {channels} channel(s) and {len} bytes")]
    MalformedFrame {
        width: u32,
        height: u32,
        channels: u8,
        len: usize,
    },
}

/// Output of one [`SignalFusionEngine::process`] call.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    /// Copy of the input with boxes, label bars and landmarks drawn in.
    pub annotated: Frame,
    pub overlay: Overlay,
    pub report: StatusReport,
}

/// Per-frame raw signals before debouncing.
struct FrameSignals {
    face_count: usize,
    away_now: bool,
    identity: IdentityCheck,
    phone_present: bool,
    book_present: bool,
}

/// Fuses face, pose, identity and object signals into debounced, counted
/// violations.
///
/// One engine per exam session. Detector failures are logged and treated
/// as "nothing detected" for that frame.
pub struct SignalFusionEngine {
    config: EngineConfig,
    face_detector: Box<dyn FaceDetector>,
    object_detector: ThrottledObjectDetector,
    verifier: IdentityVerifier,
    tracker: ViolationTracker,
    logger: Box<dyn MonitorLogger>,
}

impl SignalFusionEngine {
    pub fn new(
        config: EngineConfig,
        face_detector: Box<dyn FaceDetector>,
        object_detector: Box<dyn ObjectDetector>,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let object_detector = ThrottledObjectDetector::new(
            object_detector,
            config.object_refresh_interval(),
            config.object_target_size,
            config.object_min_confidence,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let verifier =
            IdentityVerifier::new(embedder, config.identity_threshold, config.face_crop_padding);
        let hold_config = config.clone();
        let tracker = ViolationTracker::new(move |kind| hold_config.hold(kind));

        Ok(Self {
            config,
            face_detector,
            object_detector,
            verifier,
            tracker,
            logger: Box::new(NullMonitorLogger),
        })
    }

    pub fn with_logger(mut self, logger: Box<dyn MonitorLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        self.tracker.counters()
    }

    pub fn is_identity_locked(&self) -> bool {
        self.verifier.is_locked()
    }

    pub fn logger(&self) -> &dyn MonitorLogger {
        self.logger.as_ref()
    }

    pub fn logger_mut(&mut self) -> &mut dyn MonitorLogger {
        self.logger.as_mut()
    }

    /// Locks the identity reference on the primary face of `frame`.
    ///
    /// Returns `false` (still unlocked) when no usable face is found.
    pub fn capture_reference(&mut self, frame: &Frame) -> Result<bool, MonitorError> {
        check_frame(frame)?;
        let faces = self.detect_faces(frame);
        let locked = self.verifier.capture_reference(frame, &faces);
        if locked {
            self.logger.info("Identity reference captured");
        }
        Ok(locked)
    }

    pub fn reset_reference(&mut self) {
        self.verifier.reset_reference();
    }

    /// Processes one frame taken at session time `now`.
    ///
    /// Fails only for frames whose buffer does not match their dimensions.
    pub fn process(&mut self, frame: &Frame, now: Duration) -> Result<ProcessedFrame, MonitorError> {
        check_frame(frame)?;
        let started = Instant::now();
        let mut triggers = Triggers::default();
        let mut events = Vec::new();

        // Faces, pose and identity
        let stage = Instant::now();
        let faces = self.detect_faces(frame);
        self.logger.timing("faces", elapsed_ms(stage));
        let face_count = faces.len();
        self.observe(ViolationKind::MultipleFaces, face_count > 1, now, &mut triggers, &mut events);

        let primary = primary_face(&faces);
        let away_now = primary
            .map(|face| face.landmarks.is_looking_away(&self.config.pose))
            .unwrap_or(false);

        let stage = Instant::now();
        let identity = match primary {
            Some(face) if self.verifier.is_locked() => self.verifier.check(frame, face),
            Some(_) if self.config.auto_capture_reference => {
                if self.verifier.capture_reference(frame, &faces) {
                    self.logger.info(&format!(
                        "Identity reference captured at {:.2}s",
                        now.as_secs_f64()
                    ));
                }
                IdentityCheck::default()
            }
            _ => IdentityCheck::default(),
        };
        self.logger.timing("identity", elapsed_ms(stage));

        self.observe(ViolationKind::LookingAway, away_now, now, &mut triggers, &mut events);
        self.observe(
            ViolationKind::IdentityMismatch,
            identity.mismatch,
            now,
            &mut triggers,
            &mut events,
        );

        // Objects
        let stage = Instant::now();
        let objects = self.object_detector.maybe_refresh(frame, now).to_vec();
        self.logger.timing("objects", elapsed_ms(stage));
        let phone_present = objects.iter().any(|o| o.class == ObjectClass::Phone);
        let book_present = objects.iter().any(|o| o.class == ObjectClass::Book);

        self.observe(ViolationKind::PhoneDetected, phone_present, now, &mut triggers, &mut events);
        self.observe(ViolationKind::BookDetected, book_present, now, &mut triggers, &mut events);

        let signals = FrameSignals {
            face_count,
            away_now,
            identity,
            phone_present,
            book_present,
        };

        // Annotation
        let stage = Instant::now();
        let overlay = build_overlay(primary, &objects, &signals, self.tracker.counters());
        let mut annotated = frame.clone();
        overlay.draw(&mut annotated);
        self.logger.timing("annotate", elapsed_ms(stage));

        self.logger.metric("face_count", face_count as f64);
        self.logger.metric("object_count", objects.len() as f64);
        self.logger.timing("process", elapsed_ms(started));

        let report = StatusReport {
            frame_index: frame.index(),
            timestamp: now,
            face_count,
            away_now,
            phone_present,
            book_present,
            identity_mismatch: identity.mismatch,
            identity_distance: identity.distance,
            identity_locked: self.verifier.is_locked(),
            counters: self.tracker.counters().clone(),
            triggers,
            events,
        };

        Ok(ProcessedFrame {
            annotated,
            overlay,
            report,
        })
    }

    fn detect_faces(&mut self, frame: &Frame) -> Vec<DetectedFace> {
        match self.face_detector.detect(frame) {
            Ok(faces) => faces
                .into_iter()
                .filter(|face| {
                    let finite = face.bbox.is_finite() && face.landmarks.is_finite();
                    if !finite {
                        log::warn!(
                            "Dropping face with non-finite geometry on frame {}",
                            frame.index()
                        );
                    }
                    finite
                })
                .collect(),
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        }
    }

    fn observe(
        &mut self,
        kind: ViolationKind,
        raw: bool,
        now: Duration,
        triggers: &mut Triggers,
        events: &mut Vec<ViolationEvent>,
    ) {
        if !self.tracker.observe(kind, raw, now) {
            return;
        }
        let event = ViolationEvent::new(kind, now);
        log::info!("{} at {:.2}s", event.message, now.as_secs_f64());
        self.logger.violation(&event);
        triggers.insert(kind);
        events.push(event);
    }
}

fn check_frame(frame: &Frame) -> Result<(), MonitorError> {
    if frame.is_well_formed() {
        Ok(())
    } else {
        Err(MonitorError::MalformedFrame {
            width: frame.width(),
            height: frame.height(),
            channels: frame.channels(),
            len: frame.data().len(),
        })
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

fn flag_color(flag: bool) -> Rgb {
    if flag {
        RED
    } else {
        GREEN
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

fn build_overlay(
    primary: Option<&DetectedFace>,
    objects: &[DetectedObject],
    signals: &FrameSignals,
    counters: &Counters,
) -> Overlay {
    let mut overlay = Overlay::new();

    if let Some(face) = primary {
        overlay.push(OverlayPrimitive::Rect {
            bbox: face.bbox,
            color: flag_color(signals.away_now || signals.identity.mismatch),
            thickness: BOX_THICKNESS,
            label: Some("Primary".to_string()),
        });
        if let Some(distance) = signals.identity.distance {
            let text = if signals.identity.mismatch {
                format!("ID: MISMATCH ({distance:.2})")
            } else {
                format!("ID: Verified ({distance:.2})")
            };
            overlay.push(OverlayPrimitive::Text {
                x: face.bbox.x1,
                y: face.bbox.y1 - IDENTITY_TEXT_OFFSET,
                text,
                color: flag_color(signals.identity.mismatch),
            });
        }
        for (x, y) in face.landmarks.visible_points() {
            overlay.push(OverlayPrimitive::Point {
                x,
                y,
                radius: LANDMARK_RADIUS,
                color: YELLOW,
            });
        }
    }

    for object in objects {
        overlay.push(OverlayPrimitive::Rect {
            bbox: object.bbox,
            color: match object.class {
                ObjectClass::Phone => RED,
                ObjectClass::Book => BLUE,
            },
            thickness: BOX_THICKNESS,
            label: Some(format!("{} {:.2}", object.class, object.confidence)),
        });
    }

    let tallies: Vec<String> = ViolationKind::ALL
        .iter()
        .map(|&k| counters.get(k).to_string())
        .collect();
    let tags: Vec<String> = ViolationKind::ALL
        .iter()
        .map(|k| k.short_tag().to_string())
        .collect();
    let hud = [
        (format!("Faces: {}", signals.face_count), GREEN),
        (
            format!("Away: {}", yes_no(signals.away_now)),
            flag_color(signals.away_now),
        ),
        (
            format!("Phone: {}", yes_no(signals.phone_present)),
            flag_color(signals.phone_present),
        ),
        (
            format!("Book: {}", yes_no(signals.book_present)),
            flag_color(signals.book_present),
        ),
        (
            format!("Events {}: {}", tags.join("/"), tallies.join("/")),
            GREEN,
        ),
    ];
    for (line, (text, color)) in hud.into_iter().enumerate() {
        overlay.push(OverlayPrimitive::Text {
            x: HUD_X,
            y: HUD_FIRST_LINE_Y + line as f64 * HUD_LINE_SPACING,
            text,
            color,
        });
    }

    overlay
}
