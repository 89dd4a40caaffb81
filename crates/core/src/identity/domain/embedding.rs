use serde::{Deserialize, Serialize};

/// Fixed-length facial embedding produced by an
/// [`EmbeddingProvider`](super::embedding_provider::EmbeddingProvider).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance, or `None` when the dimensions differ.
    pub fn distance(&self, other: &Embedding) -> Option<f64> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = *a as f64 - *b as f64;
                d * d
            })
            .sum();
        Some(sum.sqrt())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
