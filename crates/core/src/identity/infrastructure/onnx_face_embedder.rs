//! Face embedder backed by an ONNX recognition model (ArcFace / FaceNet style).
//!
//! Crops are resized to the model's square input, normalised to `[-1, 1]` and
//! the output vector is L2-normalised, so Euclidean distances fall in `[0, 2]`.
use std::path::Path;

use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::identity::domain::embedding_provider::EmbeddingProvider;
use crate::shared::frame::Frame;

/// Used when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: usize = 160;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxFaceEmbedder {
    session: ort::session::Session,
    input_size: usize,
}

impl OnnxFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as usize)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);
        log::info!(
            "Loaded embedding model {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session,
            input_size,
        })
    }
}

impl EmbeddingProvider for OnnxFaceEmbedder {
    fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        if !face.is_well_formed() {
            return Err("face crop is not a well-formed RGB frame".into());
        }
        let tensor = preprocess(face, self.input_size);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("embedding model produced no outputs".into());
        }
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Resize crop to `size` × `size`, normalize, NCHW layout.
fn preprocess(face: &Frame, size: usize) -> ndarray::Array4<f32> {
    let resized = face.resized(size as u32, size as u32);
    let src = resized.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[y, x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_l2_normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_shape() {
        let face = Frame::filled(50, 30, [128, 128, 128], 0);
        let tensor = preprocess(&face, DEFAULT_INPUT_SIZE);
        assert_eq!(tensor.shape(), &[1, 3, 160, 160]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let face = Frame::filled(10, 10, [255, 127, 0], 0);
        let tensor = preprocess(&face, 112);
        assert_relative_eq!(tensor[[0, 0, 5, 5]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 1, 5, 5]], (127.0 - 127.5) / 127.5, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 2, 5, 5]], -1.0, epsilon = 0.01);
    }
}
