use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Prohibited object classes the monitor reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Phone,
    Book,
}

impl ObjectClass {
    /// Maps a detector label to a monitored class; anything else is ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "phone" | "cell phone" | "cellphone" | "mobile phone" => Some(ObjectClass::Phone),
            "book" => Some(ObjectClass::Book),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectClass::Phone => write!(f, "phone"),
            ObjectClass::Book => write!(f, "book"),
        }
    }
}

/// Detector output before vocabulary filtering, in the detector's input
/// coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledDetection {
    pub label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// A monitored object in original-frame coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub class: ObjectClass,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Domain interface for general object detection.
///
/// Expensive: callers are expected to throttle it (see
/// `ThrottledObjectDetector`).
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame)
        -> Result<Vec<LabeledDetection>, Box<dyn std::error::Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cell phone", Some(ObjectClass::Phone))]
    #[case("phone", Some(ObjectClass::Phone))]
    #[case(" Cell Phone ", Some(ObjectClass::Phone))]
    #[case("book", Some(ObjectClass::Book))]
    #[case("laptop", None)]
    #[case("", None)]
    fn test_from_label(#[case] label: &str, #[case] expected: Option<ObjectClass>) {
        assert_eq!(ObjectClass::from_label(label), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(ObjectClass::Phone.to_string(), "phone");
        assert_eq!(ObjectClass::Book.to_string(), "book");
    }
}
