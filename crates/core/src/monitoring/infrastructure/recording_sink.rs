use crate::monitoring::domain::status_report::StatusReport;
use crate::monitoring::domain::violation::ViolationEvent;
use crate::monitoring::domain::violation_sink::ViolationSink;
use crate::shared::frame::Frame;
use crate::video::domain::frame_writer::FrameWriter;

/// Callback invoked for every violation as it fires.
pub type EventCallback = Box<dyn FnMut(&ViolationEvent) + Send>;

/// Sink that forwards fired violations to a callback and optionally
/// records annotated frames through a [`FrameWriter`].
///
/// The writer must already be opened; `finish` closes it.
pub struct RecordingSink {
    writer: Option<Box<dyn FrameWriter>>,
    on_event: Option<EventCallback>,
    frames_written: usize,
    events_seen: usize,
}

impl RecordingSink {
    pub fn new(writer: Option<Box<dyn FrameWriter>>, on_event: Option<EventCallback>) -> Self {
        Self {
            writer,
            on_event,
            frames_written: 0,
            events_seen: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }
}

impl ViolationSink for RecordingSink {
    fn on_frame(
        &mut self,
        annotated: &Frame,
        report: &StatusReport,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for event in &report.events {
            self.events_seen += 1;
            if let Some(ref mut callback) = self.on_event {
                callback(event);
            }
        }
        if let Some(ref mut writer) = self.writer {
            writer.write(annotated)?;
            self.frames_written += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(mut writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::domain::violation::{Counters, Triggers, ViolationKind};
    use crate::shared::stream_info::StreamInfo;
    use crate::video::infrastructure::image_sequence_writer::ImageSequenceWriter;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn report(index: usize, events: Vec<ViolationEvent>) -> StatusReport {
        StatusReport {
            frame_index: index,
            timestamp: Duration::from_secs(index as u64),
            face_count: 1,
            away_now: false,
            phone_present: false,
            book_present: false,
            identity_mismatch: false,
            identity_distance: None,
            identity_locked: false,
            counters: Counters::new(),
            triggers: Triggers::default(),
            events,
        }
    }

    #[test]
    fn test_callback_receives_each_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let mut sink = RecordingSink::new(
            None,
            Some(Box::new(move |e: &ViolationEvent| {
                sink_seen.lock().unwrap().push(e.kind)
            })),
        );
        let frame = Frame::filled(4, 4, [0, 0, 0], 0);

        sink.on_frame(&frame, &report(0, Vec::new())).unwrap();
        sink.on_frame(
            &frame,
            &report(
                1,
                vec![
                    ViolationEvent::new(ViolationKind::MultipleFaces, Duration::from_secs(1)),
                    ViolationEvent::new(ViolationKind::PhoneDetected, Duration::from_secs(1)),
                ],
            ),
        )
        .unwrap();
        sink.finish().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ViolationKind::MultipleFaces, ViolationKind::PhoneDetected]
        );
        assert_eq!(sink.events_seen(), 2);
        assert_eq!(sink.frames_written(), 0);
    }

    #[test]
    fn test_writes_annotated_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ImageSequenceWriter::new();
        let info = StreamInfo {
            width: 4,
            height: 4,
            fps: None,
            total_frames: 2,
            source_path: None,
        };
        writer.open(dir.path(), &info).unwrap();

        let mut sink = RecordingSink::new(Some(Box::new(writer)), None);
        for i in 0..2 {
            sink.on_frame(&Frame::filled(4, 4, [9, 9, 9], i), &report(i, Vec::new()))
                .unwrap();
        }
        sink.finish().unwrap();

        assert_eq!(sink.frames_written(), 2);
        assert!(dir.path().join("frame_000001.png").exists());
    }

    #[test]
    fn test_finish_twice_is_harmless() {
        let mut sink = RecordingSink::new(None, None);
        sink.finish().unwrap();
        sink.finish().unwrap();
    }
}
