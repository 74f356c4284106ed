// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Wall-clock time value used in discovery records and timestamps.

use std::ops::{Add, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds and nanoseconds since the Unix epoch.
///
/// Values are kept normalized with `0 <= nanoseconds < 1_000_000_000`;
/// instants before the epoch carry negative seconds. The derived ordering
/// over `(seconds, nanoseconds)` is therefore a total order in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSpec {
    pub seconds: i64,
    pub nanoseconds: u32,
}

const NANOS_PER_SECOND: i64 = 1_000_000_000;

impl TimeSpec {
    /// Build a normalized value. `nanoseconds` may be any magnitude or sign;
    /// whole seconds are folded into the seconds field.
    pub fn new(seconds: i64, nanoseconds: i64) -> Self {
        let extra = nanoseconds.div_euclid(NANOS_PER_SECOND);
        let nanos = nanoseconds.rem_euclid(NANOS_PER_SECOND);
        TimeSpec {
            seconds: seconds + extra,
            nanoseconds: nanos as u32,
        }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => TimeSpec::new(d.as_secs() as i64, i64::from(d.subsec_nanos())),
            Err(e) => {
                let d = e.duration();
                TimeSpec::new(-(d.as_secs() as i64), -i64::from(d.subsec_nanos()))
            }
        }
    }
}

impl Add for TimeSpec {
    type Output = TimeSpec;

    fn add(self, rhs: TimeSpec) -> TimeSpec {
        TimeSpec::new(
            self.seconds + rhs.seconds,
            i64::from(self.nanoseconds) + i64::from(rhs.nanoseconds),
        )
    }
}

impl Sub for TimeSpec {
    type Output = TimeSpec;

    fn sub(self, rhs: TimeSpec) -> TimeSpec {
        TimeSpec::new(
            self.seconds - rhs.seconds,
            i64::from(self.nanoseconds) - i64::from(rhs.nanoseconds),
        )
    }
}
