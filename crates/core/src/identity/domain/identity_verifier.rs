//! Reference-embedding identity check.
//!
//! The first usable face of the session is embedded and stored as the
//! reference. Later faces are embedded the same way and compared by
//! Euclidean distance.

use crate::detection::domain::detected_face::{primary_face, DetectedFace};
use crate::identity::domain::embedding::Embedding;
use crate::identity::domain::embedding_provider::EmbeddingProvider;
use crate::shared::frame::Frame;

/// Outcome of one identity check.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IdentityCheck {
    pub mismatch: bool,
    /// `None` when no comparison was made.
    pub distance: Option<f64>,
}

pub struct IdentityVerifier {
    provider: Box<dyn EmbeddingProvider>,
    reference: Option<Embedding>,
    threshold: f64,
    padding: u32,
}

impl IdentityVerifier {
    pub fn new(provider: Box<dyn EmbeddingProvider>, threshold: f64, padding: u32) -> Self {
        Self {
            provider,
            reference: None,
            threshold,
            padding,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&Embedding> {
        self.reference.as_ref()
    }

    /// Embeds the primary face of `faces` and stores it as the reference.
    ///
    /// Returns `false` and stays unlocked when there is no face, the padded
    /// crop is empty, or the provider fails. Replaces any existing reference.
    pub fn capture_reference(&mut self, frame: &Frame, faces: &[DetectedFace]) -> bool {
        let Some(face) = primary_face(faces) else {
            return false;
        };
        match self.embed_face(frame, face) {
            Some(embedding) if !embedding.is_empty() => {
                log::info!(
                    "Identity locked on frame {} ({}-d embedding)",
                    frame.index(),
                    embedding.len()
                );
                self.reference = Some(embedding);
                true
            }
            _ => false,
        }
    }

    pub fn reset_reference(&mut self) {
        if self.reference.take().is_some() {
            log::info!("Identity reference cleared");
        }
    }

    /// Compares `face` against the reference. Never reports a mismatch while
    /// unlocked or when the live embedding cannot be computed.
    pub fn check(&mut self, frame: &Frame, face: &DetectedFace) -> IdentityCheck {
        if self.reference.is_none() {
            return IdentityCheck::default();
        }
        let Some(live) = self.embed_face(frame, face) else {
            return IdentityCheck::default();
        };
        let Some(reference) = self.reference.as_ref() else {
            return IdentityCheck::default();
        };

        match reference.distance(&live) {
            Some(distance) => IdentityCheck {
                mismatch: distance > self.threshold,
                distance: Some(distance),
            },
            None => {
                log::warn!(
                    "Embedding size changed ({} vs reference {}), skipping identity check",
                    live.len(),
                    reference.len()
                );
                IdentityCheck::default()
            }
        }
    }

    fn embed_face(&mut self, frame: &Frame, face: &DetectedFace) -> Option<Embedding> {
        let crop = crop_face(frame, face, self.padding)?;
        match self.provider.embed(&crop) {
            Ok(values) => Some(Embedding::new(values)),
            Err(e) => {
                log::warn!("Face embedding failed: {e}");
                None
            }
        }
    }
}

/// Crops the face box grown by `padding` pixels, clamped to the frame.
pub fn crop_face(frame: &Frame, face: &DetectedFace, padding: u32) -> Option<Frame> {
    let (x1, y1, x2, y2) = face.bbox.to_pixels();
    let pad = padding as i64;
    frame.crop(
        x1.saturating_sub(pad),
        y1.saturating_sub(pad),
        x2.saturating_add(pad),
        y2.saturating_add(pad),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::shared::bounding_box::BoundingBox;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    /// Embeds a crop as its mean red value, or fails when scripted to.
    struct FakeEmbedder {
        fail: bool,
        crops: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl EmbeddingProvider for FakeEmbedder {
        fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            self.crops.lock().unwrap().push((face.width(), face.height()));
            if self.fail {
                return Err("embedder offline".into());
            }
            let pixels = face.data().chunks(3).count() as f32;
            let red: f32 = face.data().chunks(3).map(|px| px[0] as f32).sum();
            Ok(vec![red / pixels / 255.0, 0.0])
        }
    }

    fn verifier(fail: bool) -> (IdentityVerifier, Arc<Mutex<Vec<(u32, u32)>>>) {
        let crops = Arc::new(Mutex::new(Vec::new()));
        let provider = FakeEmbedder {
            fail,
            crops: crops.clone(),
        };
        (IdentityVerifier::new(Box::new(provider), 0.9, 10), crops)
    }

    fn face(x1: f64, y1: f64, x2: f64, y2: f64) -> DetectedFace {
        DetectedFace::new(
            BoundingBox::new(x1, y1, x2, y2),
            0.9,
            FaceLandmarks::new([(0.0, 0.0); 5]),
        )
    }

    #[test]
    fn test_capture_without_faces_stays_unlocked() {
        let (mut v, _) = verifier(false);
        assert!(!v.capture_reference(&Frame::filled(64, 64, [0, 0, 0], 0), &[]));
        assert!(!v.is_locked());
    }

    #[test]
    fn test_capture_uses_primary_face_with_padding() {
        let (mut v, crops) = verifier(false);
        let frame = Frame::filled(100, 100, [255, 0, 0], 0);
        let faces = [face(40.0, 40.0, 50.0, 50.0), face(20.0, 20.0, 60.0, 60.0)];

        assert!(v.capture_reference(&frame, &faces));
        assert!(v.is_locked());
        assert_eq!(crops.lock().unwrap()[0], (60, 60));
    }

    #[test]
    fn test_crop_clamped_to_frame() {
        let frame = Frame::filled(50, 50, [0, 0, 0], 0);
        let crop = crop_face(&frame, &face(0.0, 0.0, 45.0, 45.0), 10).unwrap();
        assert_eq!((crop.width(), crop.height()), (50, 50));
    }

    #[test]
    fn test_crop_of_unbounded_box_saturates() {
        let frame = Frame::filled(50, 50, [0, 0, 0], 0);
        let crop = crop_face(&frame, &face(20.0, 20.0, f64::INFINITY, 30.0), 10).unwrap();
        assert_eq!((crop.width(), crop.height()), (40, 30));
        assert!(crop_face(&frame, &face(f64::NEG_INFINITY, 0.0, 10.0, 10.0), u32::MAX).is_some());
    }

    #[test]
    fn test_face_outside_frame_gives_empty_crop() {
        let (mut v, _) = verifier(false);
        let frame = Frame::filled(50, 50, [0, 0, 0], 0);
        assert!(!v.capture_reference(&frame, &[face(200.0, 200.0, 240.0, 240.0)]));
        assert!(!v.is_locked());
    }

    #[test]
    fn test_provider_failure_on_capture_stays_unlocked() {
        let (mut v, _) = verifier(true);
        let frame = Frame::filled(64, 64, [0, 0, 0], 0);
        assert!(!v.capture_reference(&frame, &[face(10.0, 10.0, 40.0, 40.0)]));
        assert!(!v.is_locked());
    }

    #[test]
    fn test_check_before_reference_never_mismatches() {
        let (mut v, crops) = verifier(false);
        let frame = Frame::filled(64, 64, [255, 0, 0], 0);
        let result = v.check(&frame, &face(10.0, 10.0, 40.0, 40.0));
        assert_eq!(result, IdentityCheck::default());
        assert!(crops.lock().unwrap().is_empty());
    }

    #[test]
    fn test_same_face_verifies() {
        let (mut v, _) = verifier(false);
        let frame = Frame::filled(64, 64, [200, 0, 0], 0);
        let f = face(10.0, 10.0, 40.0, 40.0);
        v.capture_reference(&frame, std::slice::from_ref(&f));

        let result = v.check(&frame, &f);
        assert!(!result.mismatch);
        assert_relative_eq!(result.distance.unwrap(), 0.0);
    }

    #[test]
    fn test_different_face_mismatches() {
        // Fake distance is |mean_red difference| / 255: 255 vs 0 → 1.0 > 0.9
        let (mut v, _) = verifier(false);
        let f = face(10.0, 10.0, 40.0, 40.0);
        v.capture_reference(&Frame::filled(64, 64, [255, 0, 0], 0), std::slice::from_ref(&f));

        let result = v.check(&Frame::filled(64, 64, [0, 0, 0], 1), &f);
        assert!(result.mismatch);
        assert_relative_eq!(result.distance.unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_distance_at_threshold_is_not_mismatch() {
        let (mut v, _) = verifier(false);
        v.threshold = 1.0;
        let f = face(10.0, 10.0, 40.0, 40.0);
        v.capture_reference(&Frame::filled(64, 64, [255, 0, 0], 0), std::slice::from_ref(&f));
        assert!(!v.check(&Frame::filled(64, 64, [0, 0, 0], 1), &f).mismatch);
    }

    #[test]
    fn test_reset_unlocks() {
        let (mut v, _) = verifier(false);
        let frame = Frame::filled(64, 64, [0, 0, 0], 0);
        v.capture_reference(&frame, &[face(10.0, 10.0, 40.0, 40.0)]);
        v.reset_reference();
        assert!(!v.is_locked());
        assert!(v.reference().is_none());
    }
}
