use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The behaviours the monitor counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    LookingAway,
    MultipleFaces,
    PhoneDetected,
    BookDetected,
    IdentityMismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Severe,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::LookingAway,
        ViolationKind::MultipleFaces,
        ViolationKind::PhoneDetected,
        ViolationKind::BookDetected,
        ViolationKind::IdentityMismatch,
    ];

    /// Stable identifier used in reports and by hosts persisting events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::LookingAway => "looking_away",
            ViolationKind::MultipleFaces => "multiple_faces",
            ViolationKind::PhoneDetected => "phone_detected",
            ViolationKind::BookDetected => "book_detected",
            ViolationKind::IdentityMismatch => "identity_mismatch",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ViolationKind::LookingAway => "Looking Away",
            ViolationKind::MultipleFaces => "Multiple Faces Detected",
            ViolationKind::PhoneDetected => "Phone Detected",
            ViolationKind::BookDetected => "Book Detected",
            ViolationKind::IdentityMismatch => "Identity Mismatch",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::LookingAway | ViolationKind::MultipleFaces => Severity::Warning,
            ViolationKind::PhoneDetected
            | ViolationKind::BookDetected
            | ViolationKind::IdentityMismatch => Severity::Severe,
        }
    }

    /// One-letter tag used in the status overlay.
    pub fn short_tag(&self) -> char {
        match self {
            ViolationKind::LookingAway => 'A',
            ViolationKind::MultipleFaces => 'M',
            ViolationKind::PhoneDetected => 'P',
            ViolationKind::BookDetected => 'B',
            ViolationKind::IdentityMismatch => 'I',
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sustained violation that started on this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub message: String,
    pub severity: Severity,
    pub confidence: f64,
    /// Session time of the tick on which the event fired.
    #[serde(with = "duration_secs")]
    pub timestamp: Duration,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, timestamp: Duration) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
            severity: kind.severity(),
            confidence: 1.0,
            timestamp,
        }
    }
}

/// Session-cumulative event counts. Every kind is always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters(BTreeMap<ViolationKind, u64>);

impl Counters {
    pub fn new() -> Self {
        Self(ViolationKind::ALL.iter().map(|&k| (k, 0)).collect())
    }

    pub fn get(&self, kind: ViolationKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, kind: ViolationKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViolationKind, u64)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

/// Kinds whose sustained level rose on the current tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triggers(BTreeSet<ViolationKind>);

impl Triggers {
    pub fn fired(&self, kind: ViolationKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn any(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ViolationKind> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn insert(&mut self, kind: ViolationKind) {
        self.0.insert(kind);
    }
}

/// Serialises a `Duration` as fractional seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ViolationKind::LookingAway, "looking_away", Severity::Warning)]
    #[case(ViolationKind::MultipleFaces, "multiple_faces", Severity::Warning)]
    #[case(ViolationKind::PhoneDetected, "phone_detected", Severity::Severe)]
    #[case(ViolationKind::BookDetected, "book_detected", Severity::Severe)]
    #[case(ViolationKind::IdentityMismatch, "identity_mismatch", Severity::Severe)]
    fn test_kind_metadata(
        #[case] kind: ViolationKind,
        #[case] id: &str,
        #[case] severity: Severity,
    ) {
        assert_eq!(kind.as_str(), id);
        assert_eq!(kind.severity(), severity);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{id}\""));
    }

    #[test]
    fn test_event_defaults() {
        let event = ViolationEvent::new(ViolationKind::PhoneDetected, Duration::from_millis(1500));
        assert_eq!(event.message, "Phone Detected");
        assert_eq!(event.confidence, 1.0);
        assert_eq!(event.severity, Severity::Severe);
    }

    #[test]
    fn test_event_timestamp_serialised_as_seconds() {
        let event = ViolationEvent::new(ViolationKind::LookingAway, Duration::from_millis(2500));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["timestamp"], 2.5);
        assert_eq!(json["kind"], "looking_away");

        let back: ViolationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_counters_start_at_zero_for_every_kind() {
        let counters = Counters::new();
        assert_eq!(counters.iter().count(), 5);
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_counters_increment() {
        let mut counters = Counters::new();
        counters.increment(ViolationKind::BookDetected);
        counters.increment(ViolationKind::BookDetected);
        assert_eq!(counters.get(ViolationKind::BookDetected), 2);
        assert_eq!(counters.get(ViolationKind::PhoneDetected), 0);
        assert_eq!(counters.total(), 2);
    }

    #[test]
    fn test_triggers() {
        let mut triggers = Triggers::default();
        assert!(!triggers.any());
        triggers.insert(ViolationKind::MultipleFaces);
        assert!(triggers.fired(ViolationKind::MultipleFaces));
        assert!(!triggers.fired(ViolationKind::LookingAway));
    }
}
