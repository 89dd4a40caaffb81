pub mod debouncer;
pub mod overlay;
pub mod status_report;
pub mod violation;
pub mod violation_sink;
pub mod violation_tracker;
