//! Boolean rate limiters used to bound how often a noisy path (a liveness probe, a log
//! line) fires, independent of how often its caller is polled. Ported near-verbatim from
//! `util/gate.rs`.

use std::sync::atomic::{AtomicI64, Ordering};

/// Non-atomic, thread-unsafe interval gate: `gate(time)` returns `true` at most once per
/// `FREQ` units of `time`, and only ever moves its internal clock forward.
#[repr(transparent)]
pub struct IntervalGate<const FREQ: i64>(i64);

impl<const FREQ: i64> Default for IntervalGate<FREQ> {
    #[inline(always)]
    fn default() -> Self {
        Self(0)
    }
}

impl<const FREQ: i64> IntervalGate<FREQ> {
    #[inline(always)]
    pub fn new(initial_ts: i64) -> Self {
        Self(initial_ts)
    }

    #[inline(always)]
    pub fn gate(&mut self, time: i64) -> bool {
        if (time - self.0) >= FREQ {
            self.0 = time;
            true
        } else {
            false
        }
    }
}

unsafe impl<const FREQ: i64> Send for IntervalGate<FREQ> {}

/// Atomic, thread-safe sibling of [`IntervalGate`], for gates shared across tasks without
/// their own lock.
#[repr(transparent)]
pub struct AtomicIntervalGate<const FREQ: i64>(AtomicI64);

impl<const FREQ: i64> Default for AtomicIntervalGate<FREQ> {
    #[inline(always)]
    fn default() -> Self {
        Self(AtomicI64::new(0))
    }
}

impl<const FREQ: i64> AtomicIntervalGate<FREQ> {
    #[inline(always)]
    pub fn new(initial_ts: i64) -> Self {
        Self(AtomicI64::new(initial_ts))
    }

    #[inline(always)]
    pub fn gate(&self, time: i64) -> bool {
        let prev_time = self.0.load(Ordering::Acquire);
        if (time - prev_time) < FREQ {
            false
        } else {
            self.0.store(time, Ordering::Release);
            true
        }
    }
}

unsafe impl<const FREQ: i64> Send for AtomicIntervalGate<FREQ> {}
unsafe impl<const FREQ: i64> Sync for AtomicIntervalGate<FREQ> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_fires_once_per_interval() {
        let mut gate = IntervalGate::<10>::new(0);
        assert!(gate.gate(10));
        assert!(!gate.gate(15));
        assert!(gate.gate(21));
    }
}
