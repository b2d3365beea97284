// src/clock.rs

//! Wall-clock source and refresh-boundary arithmetic.
//!
//! Everything that compares against "now" (the schedule gate, the aligned
//! reconciliation sleep) goes through [`Clock`] so tests can drive time by
//! hand instead of sleeping.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Returns the nearest instant strictly after `now` that is an exact multiple
/// of `interval` since the Unix epoch.
///
/// Processes started at different times (or restarted) therefore tick on the
/// same boundaries. A zero interval yields `now`.
pub fn next_aligned_instant(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = interval.as_millis() as i64;
    if step <= 0 {
        return now;
    }
    let now_ms = now.timestamp_millis();
    let next_ms = (now_ms.div_euclid(step) + 1) * step;
    DateTime::from_timestamp_millis(next_ms).unwrap_or(now)
}

/// How long to wait from `now` until the next aligned instant.
pub fn until_next_aligned(now: DateTime<Utc>, interval: Duration) -> Duration {
    (next_aligned_instant(now, interval) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
