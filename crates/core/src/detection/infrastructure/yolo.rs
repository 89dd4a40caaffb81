//! Pre/post-processing shared by the YOLO-family ONNX detectors.
//!
//! Letterbox resize into a square NCHW tensor, output-layout normalisation
//! (both `[1, features, N]` and `[1, N, features]` exports), and greedy NMS.

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model doesn't specify dimensions.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox geometry needed to map detections back to frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }

    /// Converts a `(cx, cy, w, h)` box in model space to frame coordinates.
    pub fn box_to_frame(&self, cx: f64, cy: f64, w: f64, h: f64) -> BoundingBox {
        let (x1, y1) = self.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = self.to_frame(cx + w / 2.0, cy + h / 2.0);
        BoundingBox::new(x1, y1, x2, y2)
    }
}

/// Reads the square input size from an NCHW model input, or falls back to
/// [`DEFAULT_INPUT_SIZE`] when the shape is dynamic.
pub fn model_input_size(session: &ort::session::Session) -> u32 {
    session
        .inputs()
        .first()
        .and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() >= 4 && shape[2] > 0 {
                    Some(shape[2] as u32)
                } else {
                    None
                }
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_INPUT_SIZE)
}

/// Letterbox-resize a frame to `target_size` × `target_size`, padded with the
/// YOLO grey (114), normalised to `[0, 1]`.
pub fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

/// Splits a 3-D YOLO output into per-detection feature rows.
///
/// Exports disagree on whether features or detections come first; the
/// smaller axis is taken to be the feature axis.
pub fn output_rows(shape: &[usize], data: &[f32]) -> Result<Vec<Vec<f32>>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output has {} values, expected {}",
            data.len(),
            num_dets * num_feats
        ));
    }

    let rows = (0..num_dets)
        .map(|i| {
            if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            }
        })
        .collect();
    Ok(rows)
}

/// Greedy NMS: visits boxes by descending score, suppressing any box whose
/// IoU with an already-kept box exceeds `iou_thresh`. Returns kept indices.
pub fn nms(boxes: &[BoundingBox], scores: &[f64], iou_thresh: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        if keep.iter().all(|&k| boxes[k].iou(&boxes[i]) <= iou_thresh) {
            keep.push(i);
        }
    }
    keep
}
