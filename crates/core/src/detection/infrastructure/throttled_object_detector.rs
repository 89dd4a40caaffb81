use std::time::Duration;

use crate::detection::domain::object_detector::{DetectedObject, ObjectClass, ObjectDetector};
use crate::shared::frame::Frame;

/// Decorator that runs an expensive object detector at most once per
/// `refresh_interval`, reusing the last result for frames in between.
///
/// Detection runs on a downscaled copy whose long side is `target_size`;
/// boxes are mapped back to original-frame coordinates. Between refreshes the
/// cached objects are returned unchanged, so presence flags derived from them
/// are stale-but-available rather than fresh positives.
pub struct ThrottledObjectDetector {
    inner: Box<dyn ObjectDetector>,
    refresh_interval: Duration,
    target_size: u32,
    min_confidence: f64,
    last_run_time: Option<Duration>,
    last_result: Vec<DetectedObject>,
}

impl ThrottledObjectDetector {
    pub fn new(
        inner: Box<dyn ObjectDetector>,
        refresh_interval: Duration,
        target_size: u32,
        min_confidence: f64,
    ) -> Result<Self, &'static str> {
        if target_size == 0 {
            return Err("target_size must be >= 1");
        }
        Ok(Self {
            inner,
            refresh_interval,
            target_size,
            min_confidence,
            last_run_time: None,
            last_result: Vec::new(),
        })
    }

    /// Returns fresh detections when the interval has elapsed, otherwise the
    /// cached ones.
    ///
    /// A failing detector leaves both the cache and `last_run_time` untouched,
    /// so the very next frame retries.
    pub fn maybe_refresh(&mut self, frame: &Frame, now: Duration) -> &[DetectedObject] {
        if self.is_due(now) {
            match self.run(frame) {
                Ok(objects) => {
                    log::debug!(
                        "Object detection refreshed at {:.3}s: {} object(s)",
                        now.as_secs_f64(),
                        objects.len()
                    );
                    self.last_result = objects;
                    self.last_run_time = Some(now);
                }
                Err(e) => {
                    log::warn!("Object detection failed, keeping previous result: {e}");
                }
            }
        }
        &self.last_result
    }

    pub fn last_result(&self) -> &[DetectedObject] {
        &self.last_result
    }

    pub fn last_run_time(&self) -> Option<Duration> {
        self.last_run_time
    }

    fn is_due(&self, now: Duration) -> bool {
        match self.last_run_time {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.refresh_interval,
        }
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>, Box<dyn std::error::Error>> {
        let scale = downscale_factor(frame.width(), frame.height(), self.target_size);

        let resized;
        let input = if scale < 1.0 {
            let new_w = (frame.width() as f64 * scale) as u32;
            let new_h = (frame.height() as f64 * scale) as u32;
            resized = frame.resized(new_w, new_h);
            &resized
        } else {
            frame
        };

        let detections = self.inner.detect(input)?;
        let objects = detections
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .filter(|d| {
                if !d.bbox.is_finite() {
                    log::warn!("Dropping '{}' detection with non-finite box", d.label);
                }
                d.bbox.is_finite()
            })
            .filter_map(|d| {
                ObjectClass::from_label(&d.label).map(|class| DetectedObject {
                    class,
                    confidence: d.confidence,
                    bbox: d.bbox.scaled(1.0 / scale),
                })
            })
            .collect();
        Ok(objects)
    }
}

/// Aspect-preserving factor that fits the long side into `target_size`.
/// Never upscales.
fn downscale_factor(width: u32, height: u32, target_size: u32) -> f64 {
    let long_side = width.max(height).max(1) as f64;
    (target_size as f64 / long_side).min(1.0)
}
