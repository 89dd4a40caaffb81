use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, corners `(x1, y1)`–`(x2, y2)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Area of the box; inverted boxes have zero area.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Multiplies every coordinate by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x1: self.x1 * factor,
            y1: self.y1 * factor,
            x2: self.x2 * factor,
            y2: self.y2 * factor,
        }
    }

    /// Grows the box by `padding` pixels on each side.
    pub fn padded(&self, padding: f64) -> Self {
        Self {
            x1: self.x1 - padding,
            y1: self.y1 - padding,
            x2: self.x2 + padding,
            y2: self.y2 + padding,
        }
    }

    /// Whether every corner is a real number (no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
    }

    /// Integer pixel corners (truncated toward zero).
    pub fn to_pixels(&self) -> (i64, i64, i64, i64) {
        (
            self.x1 as i64,
            self.y1 as i64,
            self.x2 as i64,
            self.y2 as i64,
        )
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}
