use std::time::Duration;

/// Turns a noisy per-tick boolean into a sustained level.
///
/// The output becomes true once the input has been continuously true for
/// `hold`, and stays true until the first false input. It is
/// level-triggered: callers that count events must look for the false→true
/// transition of the returned value.
#[derive(Clone, Debug, PartialEq)]
pub struct Debouncer {
    hold: Duration,
    active_since: Option<Duration>,
}

impl Debouncer {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            active_since: None,
        }
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    /// Start of the current uninterrupted run of true inputs.
    pub fn active_since(&self) -> Option<Duration> {
        self.active_since
    }

    pub fn update(&mut self, is_active: bool, now: Duration) -> bool {
        if !is_active {
            self.active_since = None;
            return false;
        }
        match self.active_since {
            None => {
                self.active_since = Some(now);
                false
            }
            Some(start) => now.saturating_sub(start) >= self.hold,
        }
    }
}
