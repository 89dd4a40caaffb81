use std::collections::BTreeMap;
use std::time::Duration;

use crate::monitoring::domain::debouncer::Debouncer;
use crate::monitoring::domain::violation::{Counters, ViolationKind};

struct Channel {
    debouncer: Debouncer,
    sustained: bool,
}

/// One debouncer per violation kind plus the session counters.
///
/// A counter is incremented only when a kind's sustained level goes from
/// false to true, so a violation that lasts many ticks counts once.
pub struct ViolationTracker {
    channels: BTreeMap<ViolationKind, Channel>,
    counters: Counters,
}

impl ViolationTracker {
    /// `hold` gives the hold duration for each kind.
    pub fn new(hold: impl Fn(ViolationKind) -> Duration) -> Self {
        let channels = ViolationKind::ALL
            .iter()
            .map(|&kind| {
                (
                    kind,
                    Channel {
                        debouncer: Debouncer::new(hold(kind)),
                        sustained: false,
                    },
                )
            })
            .collect();
        Self {
            channels,
            counters: Counters::new(),
        }
    }

    /// Feeds one raw sample. Returns `true` on the tick a new sustained
    /// violation begins.
    pub fn observe(&mut self, kind: ViolationKind, raw: bool, now: Duration) -> bool {
        let Some(channel) = self.channels.get_mut(&kind) else {
            return false;
        };
        let sustained = channel.debouncer.update(raw, now);
        let edge = sustained && !channel.sustained;
        channel.sustained = sustained;
        if edge {
            self.counters.increment(kind);
        }
        edge
    }

    pub fn is_sustained(&self, kind: ViolationKind) -> bool {
        self.channels.get(&kind).is_some_and(|c| c.sustained)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ViolationTracker {
        ViolationTracker::new(|kind| match kind {
            ViolationKind::LookingAway => Duration::from_millis(2500),
            _ => Duration::from_secs(1),
        })
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_sustained_run_counts_once() {
        let mut t = tracker();
        let edges: Vec<bool> = (0..=20)
            .map(|i| t.observe(ViolationKind::PhoneDetected, true, secs(i as f64 * 0.1)))
            .collect();
        assert_eq!(edges.iter().filter(|&&e| e).count(), 1);
        assert!(edges[10]);
        assert_eq!(t.counters().get(ViolationKind::PhoneDetected), 1);
    }

    #[test]
    fn test_five_ticks_past_threshold_count_once() {
        let mut t = tracker();
        t.observe(ViolationKind::BookDetected, true, secs(0.0));
        for i in 0..5 {
            t.observe(ViolationKind::BookDetected, true, secs(1.0 + i as f64 * 0.1));
        }
        assert_eq!(t.counters().get(ViolationKind::BookDetected), 1);
    }

    #[test]
    fn test_interrupted_runs_count_separately() {
        let mut t = tracker();
        let kind = ViolationKind::MultipleFaces;
        t.observe(kind, true, secs(0.0));
        t.observe(kind, true, secs(1.0));
        t.observe(kind, false, secs(1.5));
        t.observe(kind, true, secs(2.0));
        assert!(t.observe(kind, true, secs(3.0)));
        assert_eq!(t.counters().get(kind), 2);
    }

    #[test]
    fn test_kinds_use_their_own_hold() {
        let mut t = tracker();
        t.observe(ViolationKind::LookingAway, true, secs(0.0));
        t.observe(ViolationKind::IdentityMismatch, true, secs(0.0));
        assert!(!t.observe(ViolationKind::LookingAway, true, secs(1.0)));
        assert!(t.observe(ViolationKind::IdentityMismatch, true, secs(1.0)));
        assert!(t.observe(ViolationKind::LookingAway, true, secs(2.5)));
    }

    #[test]
    fn test_is_sustained_follows_level() {
        let mut t = tracker();
        let kind = ViolationKind::PhoneDetected;
        t.observe(kind, true, secs(0.0));
        t.observe(kind, true, secs(1.0));
        assert!(t.is_sustained(kind));
        t.observe(kind, false, secs(1.1));
        assert!(!t.is_sustained(kind));
    }
}
