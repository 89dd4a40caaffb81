//! Scripted providers for `proctor replay`.
//!
//! A script describes what the face detector, object detector and embedder
//! "see" on each frame, so a session can be reproduced without camera input
//! or model files. Frames missing from the script see nothing.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use proctor_core::detection::domain::detected_face::DetectedFace;
use proctor_core::detection::domain::face_detector::FaceDetector;
use proctor_core::detection::domain::object_detector::{LabeledDetection, ObjectDetector};
use proctor_core::identity::domain::embedding_provider::EmbeddingProvider;
use proctor_core::shared::frame::Frame;
use proctor_core::shared::stream_info::StreamInfo;
use proctor_core::video::domain::frame_source::FrameSource;

/// Embedding returned for frames that do not script one.
const DEFAULT_EMBEDDING: [f32; 2] = [1.0, 0.0];
const BACKGROUND: [u8; 3] = [32, 32, 32];

#[derive(Debug, Deserialize)]
pub struct Script {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
    #[serde(default)]
    pub frames: Vec<ScriptedFrame>,
}

/// Detections for one frame. Coordinates are in script-frame pixels.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScriptedFrame {
    pub index: usize,
    pub faces: Vec<DetectedFace>,
    pub objects: Vec<LabeledDetection>,
    pub embedding: Option<Vec<f32>>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read script {}: {e}", path.display()))?;
        let script: Script = serde_json::from_str(&text)
            .map_err(|e| format!("Invalid script {}: {e}", path.display()))?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.width == 0 || self.height == 0 {
            return Err("Script frame size must be non-zero".into());
        }
        if !(self.fps > 0.0) {
            return Err(format!("Script fps must be positive, got {}", self.fps).into());
        }
        if let Some(frame) = self.frames.iter().find(|f| f.index >= self.frame_count) {
            return Err(format!(
                "Scripted frame {} is outside frame_count {}",
                frame.index, self.frame_count
            )
            .into());
        }
        Ok(())
    }

    pub fn stream_info(&self, path: &Path) -> StreamInfo {
        StreamInfo {
            width: self.width,
            height: self.height,
            fps: Some(self.fps),
            total_frames: self.frame_count,
            source_path: Some(path.to_path_buf()),
        }
    }

    /// Splits the script into its four providers.
    pub fn into_providers(self) -> ScriptProviders {
        let by_index: HashMap<usize, ScriptedFrame> =
            self.frames.into_iter().map(|f| (f.index, f)).collect();
        let by_index = Arc::new(by_index);
        ScriptProviders {
            source: ScriptedSource {
                width: self.width,
                height: self.height,
                fps: self.fps,
                frame_count: self.frame_count,
            },
            faces: ScriptedFaceDetector {
                frames: by_index.clone(),
            },
            objects: ScriptedObjectDetector {
                frames: by_index.clone(),
                script_width: self.width,
            },
            embedder: ScriptedEmbedder { frames: by_index },
        }
    }
}

pub struct ScriptProviders {
    pub source: ScriptedSource,
    pub faces: ScriptedFaceDetector,
    pub objects: ScriptedObjectDetector,
    pub embedder: ScriptedEmbedder,
}

/// Yields plain background frames; the script supplies the detections.
pub struct ScriptedSource {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: usize,
}

impl FrameSource for ScriptedSource {
    fn open(&mut self, path: &Path) -> Result<StreamInfo, Box<dyn std::error::Error>> {
        Ok(StreamInfo {
            width: self.width,
            height: self.height,
            fps: Some(self.fps),
            total_frames: self.frame_count,
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let (width, height) = (self.width, self.height);
        Box::new((0..self.frame_count).map(move |i| Ok(Frame::filled(width, height, BACKGROUND, i))))
    }

    fn close(&mut self) {}
}

pub struct ScriptedFaceDetector {
    frames: Arc<HashMap<usize, ScriptedFrame>>,
}

impl FaceDetector for ScriptedFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        Ok(self
            .frames
            .get(&frame.index())
            .map(|f| f.faces.clone())
            .unwrap_or_default())
    }
}

/// The engine hands the object detector a downscaled frame, so scripted
/// boxes are scaled to match it.
pub struct ScriptedObjectDetector {
    frames: Arc<HashMap<usize, ScriptedFrame>>,
    script_width: u32,
}

impl ObjectDetector for ScriptedObjectDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<LabeledDetection>, Box<dyn std::error::Error>> {
        let scale = frame.width() as f64 / self.script_width as f64;
        Ok(self
            .frames
            .get(&frame.index())
            .map(|f| {
                f.objects
                    .iter()
                    .map(|d| LabeledDetection {
                        bbox: d.bbox.scaled(scale),
                        ..d.clone()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct ScriptedEmbedder {
    frames: Arc<HashMap<usize, ScriptedFrame>>,
}

impl EmbeddingProvider for ScriptedEmbedder {
    fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        Ok(self
            .frames
            .get(&face.index())
            .and_then(|f| f.embedding.clone())
            .unwrap_or_else(|| DEFAULT_EMBEDDING.to_vec()))
    }
}
