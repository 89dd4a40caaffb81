use crate::shared::frame::Frame;

/// Domain interface for face embedding.
///
/// `face` is an RGB crop around a single face. Implementations resize it to
/// their own input resolution.
pub trait EmbeddingProvider: Send {
    fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
