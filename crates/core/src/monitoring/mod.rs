pub mod domain;
pub mod engine_config;
pub mod infrastructure;
pub mod monitor_logger;
pub mod monitor_runner;
pub mod signal_fusion_engine;
