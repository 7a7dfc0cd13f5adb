//! A strictly non-decreasing time source, separate from wall-clock.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// An opaque point on the engine's monotonic timeline.
///
/// Two `MonotonicTime` values are only meaningfully comparable when produced
/// by the same [`MonotonicClock`]; every entry's `createdAt`/`expireAt` and
/// every lock-wait deadline is one of these, never a wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTime(Duration);

impl MonotonicTime {
    /// The clock's epoch, i.e. `MonotonicClock::new()`'s construction instant.
    pub const ZERO: MonotonicTime = MonotonicTime(Duration::ZERO);

    /// `self + d`, saturating rather than panicking on overflow — a job
    /// created with a huge `expireIn` must not panic the writer.
    pub fn saturating_add(self, d: Duration) -> Self {
        MonotonicTime(self.0.saturating_add(d))
    }

    /// `self - other`, clamped to zero when `other` is later than `self`.
    pub fn saturating_sub(self, other: Self) -> Duration {
        self.0.saturating_sub(other.0)
    }

    /// Whether `self` is at or before `now` — i.e. this deadline has passed.
    pub fn has_elapsed(self, now: Self) -> bool {
        self <= now
    }
}

/// Produces [`MonotonicTime`] values and converts them to UTC on demand.
///
/// Backed by `Instant`, which the standard library already guarantees is
/// non-decreasing; `to_utc` anchors every reading against the wall-clock
/// time observed at construction, so conversions stay consistent even if the
/// system clock is stepped afterwards.
#[derive(Debug)]
pub struct MonotonicClock {
    epoch_instant: Instant,
    epoch_utc: DateTime<Utc>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch_instant: Instant::now(),
            epoch_utc: Utc::now(),
        }
    }

    /// The current point on this clock's timeline.
    pub fn now(&self) -> MonotonicTime {
        MonotonicTime(self.epoch_instant.elapsed())
    }

    /// Convert a reading from this clock into a UTC timestamp.
    pub fn to_utc(&self, t: MonotonicTime) -> DateTime<Utc> {
        match chrono::Duration::from_std(t.0) {
            Ok(delta) => self.epoch_utc + delta,
            Err(_) => self.epoch_utc,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_non_decreasing() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn saturating_add_does_not_panic_on_huge_duration() {
        let t = MonotonicTime::ZERO;
        let huge = Duration::from_secs(u64::MAX);
        let _ = t.saturating_add(huge);
    }

    #[test]
    fn saturating_sub_clamps_to_zero() {
        let clock = MonotonicClock::new();
        let now = clock.now();
        let later = now.saturating_add(Duration::from_secs(1));
        assert_eq!(now.saturating_sub(later), Duration::ZERO);
    }
}
