pub mod recording_sink;
pub mod threaded_monitor_runner;
