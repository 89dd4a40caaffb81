use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Returned boxes and landmarks are in the coordinates of `frame`.
/// Implementations may hold inference sessions or scratch buffers, hence
/// `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>>;
}
