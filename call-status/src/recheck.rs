use crate::types::RecheckState;
use chrono::{DateTime, Duration, Utc};

/// Whether a call status re-check is due: always on the first check, then
/// only once strictly more than `threshold` has passed.
pub fn should_recheck_now(last_checked_at: Option<DateTime<Utc>>, threshold: Duration, now: DateTime<Utc>) -> bool {
    match last_checked_at {
        None => true,
        Some(last) => now.signed_duration_since(last) > threshold,
    }
}

/// Rate limiter for call status re-checks of one user.
#[derive(Debug, Clone, Copy)]
pub struct RecheckGate {
    threshold: Duration,
}

impl RecheckGate {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn should_recheck_now(&self, state: &RecheckState, now: DateTime<Utc>) -> bool {
        should_recheck_now(state.last_checked_at, self.threshold, now)
    }

    /// Decide once and stamp `now` into `state` if the gate opened.
    pub fn check(&self, state: &mut RecheckState, now: DateTime<Utc>) -> bool {
        let due = self.should_recheck_now(state, now);
        if due {
            state.record_check(now);
        }
        due
    }
}
