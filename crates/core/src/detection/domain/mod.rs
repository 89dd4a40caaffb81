pub mod detected_face;
pub mod face_detector;
pub mod face_landmarks;
pub mod object_detector;
