//! YOLO-pose face detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, keypoint decoding and NMS.
//! Faces are returned per frame without tracking; the monitor only needs
//! counts and the primary face.
use std::path::Path;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;
use super::yolo::{self, Letterbox};

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Load a YOLO-pose ONNX model. The input resolution is read from the
    /// model (NCHW), falling back to 640 when the shape is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        let input_size = yolo::model_input_size(&session);
        log::info!(
            "Loaded face model {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = yolo::letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let rows = yolo::output_rows(tensor.shape(), data)?;

        Ok(decode_faces(&rows, &letterbox, self.confidence))
    }
}

/// Turns `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]` rows into faces
/// in frame coordinates, after confidence filtering and NMS.
fn decode_faces(rows: &[Vec<f32>], letterbox: &Letterbox, min_confidence: f64) -> Vec<DetectedFace> {
    let candidates: Vec<DetectedFace> = rows
        .iter()
        .filter(|row| row.len() >= 5 && row[4] as f64 >= min_confidence)
        .map(|row| {
            let bbox = letterbox.box_to_frame(
                row[0] as f64,
                row[1] as f64,
                row[2] as f64,
                row[3] as f64,
            );
            DetectedFace::new(bbox, row[4] as f64, decode_keypoints(row, letterbox))
        })
        .collect();

    let boxes: Vec<_> = candidates.iter().map(|f| f.bbox).collect();
    let scores: Vec<f64> = candidates.iter().map(|f| f.confidence).collect();
    let mut keep = yolo::nms(&boxes, &scores, NMS_IOU_THRESH);
    // Back to model output order so primary-face ties stay deterministic.
    keep.sort_unstable();

    keep.into_iter().map(|i| candidates[i].clone()).collect()
}

/// Invisible or missing keypoints stay at `(0, 0)`.
fn decode_keypoints(row: &[f32], letterbox: &Letterbox) -> FaceLandmarks {
    let mut pts = [(0.0f64, 0.0f64); 5];
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        for (k, pt) in pts.iter_mut().enumerate() {
            let base = 5 + k * 3;
            if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                *pt = letterbox.to_frame(row[base] as f64, row[base + 1] as f64);
            }
        }
    }
    FaceLandmarks::new(pts)
}
