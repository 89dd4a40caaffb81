//! Drawable annotation primitives and a minimal CPU rasteriser.
//!
//! The engine describes what to draw as a list of [`OverlayPrimitive`]s. Box
//! outlines, label bars and markers are burned into the annotated frame;
//! text is left for the host to render (no font is bundled).

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

pub type Rgb = [u8; 3];

pub const RED: Rgb = [255, 0, 0];
pub const GREEN: Rgb = [0, 255, 0];
pub const BLUE: Rgb = [0, 0, 255];
pub const YELLOW: Rgb = [255, 255, 0];

pub const BOX_THICKNESS: u32 = 2;
pub const LANDMARK_RADIUS: u32 = 2;

/// Height of the filled bar drawn above a labelled box.
const LABEL_BAR_HEIGHT: i64 = 22;
/// Approximate glyph advance used to size label bars.
const LABEL_CHAR_WIDTH: i64 = 8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayPrimitive {
    Rect {
        bbox: BoundingBox,
        color: Rgb,
        thickness: u32,
        label: Option<String>,
    },
    Point {
        x: f64,
        y: f64,
        radius: u32,
        color: Rgb,
    },
    /// Text anchored at its baseline-left corner.
    Text {
        x: f64,
        y: f64,
        text: String,
        color: Rgb,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    primitives: Vec<OverlayPrimitive>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, primitive: OverlayPrimitive) {
        self.primitives.push(primitive);
    }

    pub fn primitives(&self) -> &[OverlayPrimitive] {
        &self.primitives
    }

    /// Every text string, including box labels, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.primitives
            .iter()
            .filter_map(|p| match p {
                OverlayPrimitive::Rect {
                    label: Some(label), ..
                } => Some(label.as_str()),
                OverlayPrimitive::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Burns the rasterisable primitives into `frame`.
    pub fn draw(&self, frame: &mut Frame) {
        for primitive in &self.primitives {
            match primitive {
                OverlayPrimitive::Rect {
                    bbox,
                    color,
                    thickness,
                    label,
                } => {
                    draw_rect_outline(frame, bbox, *color, *thickness);
                    if let Some(label) = label {
                        let (x1, y1, _, _) = bbox.to_pixels();
                        let width = LABEL_CHAR_WIDTH * label.chars().count() as i64;
                        fill_rect(
                            frame,
                            x1,
                            y1.saturating_sub(LABEL_BAR_HEIGHT),
                            x1.saturating_add(width),
                            y1,
                            *color,
                        );
                    }
                }
                OverlayPrimitive::Point {
                    x,
                    y,
                    radius,
                    color,
                } => fill_circle(frame, *x as i64, *y as i64, *radius as i64, *color),
                OverlayPrimitive::Text { .. } => {}
            }
        }
    }
}

fn put_pixel(frame: &mut Frame, x: i64, y: i64, color: Rgb) {
    if x < 0 || y < 0 || x >= frame.width() as i64 || y >= frame.height() as i64 {
        return;
    }
    let channels = frame.channels() as usize;
    let offset = (y as usize * frame.width() as usize + x as usize) * channels;
    let data = frame.data_mut();
    data[offset..offset + 3].copy_from_slice(&color);
}

/// Fills `[x1, x2) × [y1, y2)`, clipped to the frame.
fn fill_rect(frame: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb) {
    let x1 = x1.max(0);
    let y1 = y1.max(0);
    let x2 = x2.min(frame.width() as i64);
    let y2 = y2.min(frame.height() as i64);
    for y in y1..y2 {
        for x in x1..x2 {
            put_pixel(frame, x, y, color);
        }
    }
}

/// Outline grown inward from the box edges by `thickness` pixels.
fn draw_rect_outline(frame: &mut Frame, bbox: &BoundingBox, color: Rgb, thickness: u32) {
    let (x1, y1, x2, y2) = bbox.to_pixels();
    if x2 < x1 || y2 < y1 {
        return;
    }
    let t = thickness.max(1) as i64;
    // Exclusive far edges.
    let x_end = x2.saturating_add(1);
    let y_end = y2.saturating_add(1);
    fill_rect(frame, x1, y1, x_end, y1.saturating_add(t).min(y_end), color);
    fill_rect(frame, x1, y_end.saturating_sub(t).max(y1), x_end, y_end, color);
    fill_rect(frame, x1, y1, x1.saturating_add(t).min(x_end), y_end, color);
    fill_rect(frame, x_end.saturating_sub(t).max(x1), y1, x_end, y_end, color);
}

fn fill_circle(frame: &mut Frame, cx: i64, cy: i64, radius: i64, color: Rgb) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(frame, cx.saturating_add(dx), cy.saturating_add(dy), color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let arr = frame.as_ndarray();
        [
            arr[[y as usize, x as usize, 0]],
            arr[[y as usize, x as usize, 1]],
            arr[[y as usize, x as usize, 2]],
        ]
    }

    #[test]
    fn test_rect_outline_leaves_interior() {
        let mut frame = Frame::filled(40, 40, [0, 0, 0], 0);
        let mut overlay = Overlay::new();
        overlay.push(OverlayPrimitive::Rect {
            bbox: BoundingBox::new(10.0, 10.0, 30.0, 30.0),
            color: GREEN,
            thickness: 2,
            label: None,
        });
        overlay.draw(&mut frame);

        assert_eq!(pixel(&frame, 10, 10), GREEN);
        assert_eq!(pixel(&frame, 11, 20), GREEN);
        assert_eq!(pixel(&frame, 30, 30), GREEN);
        assert_eq!(pixel(&frame, 20, 20), [0, 0, 0]);
        assert_eq!(pixel(&frame, 5, 5), [0, 0, 0]);
    }

    #[test]
    fn test_label_bar_drawn_above_box() {
        let mut frame = Frame::filled(60, 60, [0, 0, 0], 0);
        let mut overlay = Overlay::new();
        overlay.push(OverlayPrimitive::Rect {
            bbox: BoundingBox::new(5.0, 30.0, 50.0, 55.0),
            color: RED,
            thickness: 1,
            label: Some("ab".to_string()),
        });
        overlay.draw(&mut frame);

        assert_eq!(pixel(&frame, 10, 20), RED);
        assert_eq!(pixel(&frame, 25, 20), [0, 0, 0]);
    }

    #[test]
    fn test_shapes_clipped_to_frame() {
        let mut frame = Frame::filled(10, 10, [0, 0, 0], 0);
        let mut overlay = Overlay::new();
        overlay.push(OverlayPrimitive::Rect {
            bbox: BoundingBox::new(-20.0, -20.0, 50.0, 50.0),
            color: BLUE,
            thickness: 2,
            label: Some("label".to_string()),
        });
        overlay.push(OverlayPrimitive::Point {
            x: 0.0,
            y: 0.0,
            radius: 3,
            color: YELLOW,
        });
        overlay.draw(&mut frame);
        assert_eq!(pixel(&frame, 0, 0), YELLOW);
    }

    #[test]
    fn test_unbounded_box_is_clipped() {
        let mut frame = Frame::filled(10, 10, [0, 0, 0], 0);
        let mut overlay = Overlay::new();
        overlay.push(OverlayPrimitive::Rect {
            bbox: BoundingBox::new(2.0, 2.0, f64::INFINITY, f64::INFINITY),
            color: RED,
            thickness: 1,
            label: Some("face".to_string()),
        });
        overlay.push(OverlayPrimitive::Point {
            x: f64::NEG_INFINITY,
            y: 5.0,
            radius: 2,
            color: YELLOW,
        });
        overlay.draw(&mut frame);
        assert_eq!(pixel(&frame, 2, 2), RED);
        assert_eq!(pixel(&frame, 5, 5), [0, 0, 0]);
    }

    #[test]
    fn test_point_is_filled_disc() {
        let mut frame = Frame::filled(20, 20, [0, 0, 0], 0);
        let mut overlay = Overlay::new();
        overlay.push(OverlayPrimitive::Point {
            x: 10.0,
            y: 10.0,
            radius: 2,
            color: YELLOW,
        });
        overlay.draw(&mut frame);
        assert_eq!(pixel(&frame, 10, 10), YELLOW);
        assert_eq!(pixel(&frame, 12, 10), YELLOW);
        assert_eq!(pixel(&frame, 12, 12), [0, 0, 0]);
    }

    #[test]
    fn test_text_is_collected_not_drawn() {
        let mut frame = Frame::filled(20, 20, [0, 0, 0], 0);
        let mut overlay = Overlay::new();
        overlay.push(OverlayPrimitive::Text {
            x: 0.0,
            y: 10.0,
            text: "Faces: 1".to_string(),
            color: GREEN,
        });
        overlay.draw(&mut frame);
        assert!(frame.data().iter().all(|&b| b == 0));
        assert_eq!(overlay.texts(), vec!["Faces: 1"]);
    }
}
