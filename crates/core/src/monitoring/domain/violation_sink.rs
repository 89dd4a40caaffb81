use crate::monitoring::domain::status_report::StatusReport;
use crate::shared::frame::Frame;

/// Receives the engine's output for every processed frame.
///
/// Hosts persist `report.events` here; the annotated frame is provided for
/// display or recording.
pub trait ViolationSink: Send {
    fn on_frame(
        &mut self,
        annotated: &Frame,
        report: &StatusReport,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Called once after the last frame. Default: no-op.
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
