//! A UTC timestamp with sub-second precision, serialized canonically as `(secs, nanos)` so
//! replication envelopes hash identically across peers.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Timestamp {
    secs: u64,
    nanos: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(t: SystemTime) -> Self {
        let d = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Timestamp { secs: d.as_secs(), nanos: d.subsec_nanos() }
    }

    pub fn as_duration_since_epoch(&self) -> Duration {
        Duration::new(self.secs, self.nanos)
    }

    /// Seconds elapsed between `self` (earlier) and `other` (later), clamped to `>= 0.0`.
    /// Used for Merkle time-bucket calculation where `self` is a record's creation time and
    /// `other` is the anti-entropy round's `source_time`.
    pub fn elapsed_seconds_until(&self, other: Timestamp) -> f64 {
        let a = self.as_duration_since_epoch();
        let b = other.as_duration_since_epoch();
        b.checked_sub(a).unwrap_or(Duration::ZERO).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_seconds_clamps_to_zero_when_negative() {
        let later = Timestamp::now();
        let earlier = Timestamp { secs: later.secs.saturating_sub(10), nanos: 0 };
        assert_eq!(later.elapsed_seconds_until(earlier), 0.0);
        assert!(earlier.elapsed_seconds_until(later) >= 10.0);
    }
}
