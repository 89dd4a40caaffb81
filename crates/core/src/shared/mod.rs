pub mod bounding_box;
pub mod constants;
pub mod frame;
pub mod model_resolver;
pub mod stream_info;
