//! COCO-trained YOLO object detector using ONNX Runtime via `ort`.
//!
//! Only the classes the monitor cares about are reported, labelled with their
//! COCO names so `ObjectClass::from_label` can map them.
use std::path::Path;

use crate::detection::domain::object_detector::{LabeledDetection, ObjectDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;
use super::yolo::{self, Letterbox};

/// Pre-filter applied before NMS; the throttling decorator applies the
/// configured threshold on top.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// COCO class ids reported by this detector.
const COCO_LABELS: &[(usize, &str)] = &[(67, "cell phone"), (73, "book")];

const BOX_VALUES: usize = 4;

pub struct OnnxObjectDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxObjectDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        let input_size = yolo::model_input_size(&session);
        log::info!(
            "Loaded object model {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl ObjectDetector for OnnxObjectDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<LabeledDetection>, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = yolo::letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let rows = yolo::output_rows(tensor.shape(), data)?;

        Ok(decode_objects(&rows, &letterbox, self.confidence))
    }
}

/// Decodes `[cx, cy, w, h, score_0, .., score_79]` rows. Each row is assigned
/// its best-scoring class; rows whose best class is not monitored are
/// dropped. NMS runs per class.
fn decode_objects(
    rows: &[Vec<f32>],
    letterbox: &Letterbox,
    min_confidence: f64,
) -> Vec<LabeledDetection> {
    let mut detections = Vec::new();

    for &(class_id, label) in COCO_LABELS {
        let mut boxes: Vec<BoundingBox> = Vec::new();
        let mut scores: Vec<f64> = Vec::new();

        for row in rows {
            let Some((best, score)) = best_class(row) else {
                continue;
            };
            if best != class_id || score < min_confidence {
                continue;
            }
            boxes.push(letterbox.box_to_frame(
                row[0] as f64,
                row[1] as f64,
                row[2] as f64,
                row[3] as f64,
            ));
            scores.push(score);
        }

        for i in yolo::nms(&boxes, &scores, NMS_IOU_THRESH) {
            detections.push(LabeledDetection {
                label: label.to_string(),
                confidence: scores[i],
                bbox: boxes[i],
            });
        }
    }

    detections
}

fn best_class(row: &[f32]) -> Option<(usize, f64)> {
    row.get(BOX_VALUES..)?
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(class, &score)| (class, score as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(cx: f32, cy: f32, class: usize, score: f32) -> Vec<f32> {
        let mut r = vec![0.0f32; BOX_VALUES + 80];
        r[0] = cx;
        r[1] = cy;
        r[2] = 20.0;
        r[3] = 20.0;
        r[BOX_VALUES + class] = score;
        r
    }

    fn lb() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    #[test]
    fn test_only_monitored_classes_are_reported() {
        let rows = vec![row(50.0, 50.0, 67, 0.8), row(150.0, 50.0, 0, 0.9), row(250.0, 50.0, 73, 0.7)];
        let dets = decode_objects(&rows, &lb(), DEFAULT_CONFIDENCE);
        let labels: Vec<&str> = dets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["cell phone", "book"]);
        assert_eq!(dets[0].bbox, BoundingBox::new(40.0, 40.0, 60.0, 60.0));
    }

    #[test]
    fn test_low_scores_dropped() {
        let dets = decode_objects(&[row(50.0, 50.0, 67, 0.1)], &lb(), DEFAULT_CONFIDENCE);
        assert!(dets.is_empty());
    }

    #[test]
    fn test_overlapping_same_class_suppressed() {
        let rows = vec![row(50.0, 50.0, 73, 0.6), row(51.0, 50.0, 73, 0.9)];
        let dets = decode_objects(&rows, &lb(), DEFAULT_CONFIDENCE);
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].confidence, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_overlapping_different_classes_kept() {
        let rows = vec![row(50.0, 50.0, 73, 0.6), row(50.0, 50.0, 67, 0.9)];
        assert_eq!(decode_objects(&rows, &lb(), DEFAULT_CONFIDENCE).len(), 2);
    }

    #[test]
    fn test_best_class_on_short_row() {
        assert_eq!(best_class(&[1.0, 2.0]), None);
        assert_eq!(best_class(&[0.0, 0.0, 0.0, 0.0, 0.25, 0.5]), Some((1, 0.5)));
    }
}
