pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// COCO-trained YOLO detector; not downloadable, supplied by the user.
pub const OBJECT_MODEL_NAME: &str = "yolo11n.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Seconds a condition must persist before it counts as a violation.
pub const AWAY_HOLD_SECS: f64 = 2.5;
pub const MULTI_FACE_HOLD_SECS: f64 = 1.0;
pub const PHONE_HOLD_SECS: f64 = 1.0;
pub const BOOK_HOLD_SECS: f64 = 1.0;
pub const IDENTITY_HOLD_SECS: f64 = 1.0;

/// Minimum seconds between two object-detector runs.
pub const OBJECT_REFRESH_INTERVAL_SECS: f64 = 0.6;
/// Long-side resolution of the copy handed to the object detector.
pub const OBJECT_TARGET_SIZE: u32 = 320;
pub const OBJECT_MIN_CONFIDENCE: f64 = 0.4;

/// Euclidean embedding distance above which the live face is a different person.
pub const IDENTITY_DISTANCE_THRESHOLD: f64 = 0.9;
/// Pixels added around the face box before cropping for the embedder.
pub const FACE_CROP_PADDING: u32 = 10;

pub const YAW_THRESHOLD: f64 = 0.45;
pub const PITCH_MIN: f64 = 0.15;
pub const PITCH_MAX: f64 = 0.85;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
