pub mod execution_provider;
pub mod onnx_face_detector;
pub mod onnx_object_detector;
pub mod throttled_object_detector;
pub mod yolo;
