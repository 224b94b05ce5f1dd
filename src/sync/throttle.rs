use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// TTL gate for the reconciliation sweep.
///
/// Owns its own "last run" marker; callers pass the current time in, so the
/// gate can be exercised with synthetic timestamps.
#[derive(Debug)]
pub struct SyncThrottle {
    ttl: Duration,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl SyncThrottle {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_run: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` and records `now` if the TTL has elapsed since the last
    /// accepted run (or nothing has run yet).
    pub fn should_run(&self, now: DateTime<Utc>) -> bool {
        let mut last_run = self
            .last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match *last_run {
            // A clock that moved backwards also re-arms the gate.
            Some(last) if now >= last && now - last < self.ttl => false,
            _ => {
                *last_run = Some(now);
                true
            }
        }
    }

    /// When the last accepted run happened.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self
            .last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_first_call_runs() {
        let throttle = SyncThrottle::new(Duration::seconds(60));
        assert!(throttle.last_run().is_none());
        assert!(throttle.should_run(at(0)));
        assert_eq!(throttle.last_run(), Some(at(0)));
    }

    #[test]
    fn test_calls_within_ttl_are_skipped() {
        let throttle = SyncThrottle::new(Duration::seconds(60));
        assert!(throttle.should_run(at(0)));
        assert!(!throttle.should_run(at(1)));
        assert!(!throttle.should_run(at(59)));
        assert_eq!(throttle.last_run(), Some(at(0)));
    }

    #[test]
    fn test_runs_again_after_ttl() {
        let throttle = SyncThrottle::new(Duration::seconds(60));
        assert!(throttle.should_run(at(0)));
        assert!(throttle.should_run(at(60)));
        assert!(!throttle.should_run(at(100)));
        assert!(throttle.should_run(at(125)));
    }

    #[test]
    fn test_clock_going_backwards_rearms() {
        let throttle = SyncThrottle::new(Duration::seconds(60));
        assert!(throttle.should_run(at(100)));
        assert!(throttle.should_run(at(10)));
        assert_eq!(throttle.last_run(), Some(at(10)));
    }

    #[test]
    fn test_zero_ttl_always_runs() {
        let throttle = SyncThrottle::new(Duration::zero());
        assert!(throttle.should_run(at(0)));
        assert!(throttle.should_run(at(0)));
    }
}
