use serde::{Deserialize, Serialize};

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;

/// One face reported by a [`FaceDetector`](super::face_detector::FaceDetector).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub landmarks: FaceLandmarks,
}

impl DetectedFace {
    pub fn new(bbox: BoundingBox, confidence: f64, landmarks: FaceLandmarks) -> Self {
        Self {
            bbox,
            confidence,
            landmarks,
        }
    }
}

/// The face with the largest box area; exact ties go to the earliest face.
pub fn primary_face(faces: &[DetectedFace]) -> Option<&DetectedFace> {
    faces.iter().fold(None, |best: Option<&DetectedFace>, face| match best {
        Some(b) if b.bbox.area() >= face.bbox.area() => Some(b),
        _ => Some(face),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> DetectedFace {
        DetectedFace::new(
            BoundingBox::new(x1, y1, x2, y2),
            confidence,
            FaceLandmarks::new([(0.0, 0.0); 5]),
        )
    }

    #[test]
    fn test_no_faces() {
        assert!(primary_face(&[]).is_none());
    }

    #[test]
    fn test_single_face() {
        let faces = vec![face(0.0, 0.0, 10.0, 10.0, 0.9)];
        assert_eq!(primary_face(&faces), Some(&faces[0]));
    }

    #[test]
    fn test_largest_area_wins() {
        let faces = vec![
            face(0.0, 0.0, 10.0, 10.0, 0.99),
            face(50.0, 50.0, 100.0, 100.0, 0.6),
            face(200.0, 0.0, 220.0, 20.0, 0.8),
        ];
        assert_eq!(primary_face(&faces), Some(&faces[1]));
    }

    #[test]
    fn test_exact_tie_picks_first() {
        let faces = vec![
            face(0.0, 0.0, 20.0, 20.0, 0.5),
            face(100.0, 100.0, 120.0, 120.0, 0.9),
        ];
        assert_eq!(primary_face(&faces).unwrap().confidence, 0.5);
    }
}
