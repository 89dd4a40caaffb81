use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monitoring::domain::violation::{duration_secs, Counters, Triggers, ViolationEvent};

/// Per-frame outcome of [`SignalFusionEngine::process`](crate::monitoring::signal_fusion_engine::SignalFusionEngine::process).
///
/// The booleans are this frame's raw signals; `triggers` and `events` only
/// carry violations whose sustained level started on this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub frame_index: usize,
    #[serde(with = "duration_secs")]
    pub timestamp: Duration,
    pub face_count: usize,
    pub away_now: bool,
    pub phone_present: bool,
    pub book_present: bool,
    pub identity_mismatch: bool,
    pub identity_distance: Option<f64>,
    pub identity_locked: bool,
    pub counters: Counters,
    pub triggers: Triggers,
    pub events: Vec<ViolationEvent>,
}
