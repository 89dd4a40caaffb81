pub mod detection;
pub mod identity;
pub mod monitoring;
pub mod shared;
pub mod video;
