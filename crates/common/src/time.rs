//! Native media time.
//!
//! Timelines are expressed in integer ticks of a fixed timescale (ticks per
//! second), the representation container formats and native export engines
//! use. Callers speak milliseconds; conversions between the two are exact
//! whenever the timescale is a multiple of 1000, so repeated round trips
//! never accumulate drift.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// MPEG-style 90 kHz clock.
pub const DEFAULT_TIMESCALE: u32 = 90_000;

/// A point or span in native ticks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NativeTime {
    /// Tick count.
    pub value: i64,
    /// Ticks per second. Always positive.
    pub timescale: u32,
}

impl NativeTime {
    /// Zero in the given timescale.
    pub const fn zero(timescale: u32) -> Self {
        Self {
            value: 0,
            timescale,
        }
    }

    pub const fn new(value: i64, timescale: u32) -> Self {
        Self { value, timescale }
    }

    /// Convert milliseconds to ticks, rounding to the nearest tick when the
    /// timescale is not a multiple of 1000.
    ///
    /// Saturates at the `i64` tick range; use [`NativeTime::checked_from_millis`]
    /// for untrusted input.
    pub fn from_millis(ms: i64, timescale: u32) -> Self {
        Self {
            value: rescale_saturating(ms as i128, 1000, timescale as i128),
            timescale,
        }
    }

    /// Like [`NativeTime::from_millis`], but `None` when the tick count does
    /// not fit in an `i64`.
    pub fn checked_from_millis(ms: i64, timescale: u32) -> Option<Self> {
        rescale(ms as i128, 1000, timescale as i128).map(|value| Self { value, timescale })
    }

    /// Convert back to milliseconds, rounding to the nearest millisecond.
    pub fn to_millis(self) -> i64 {
        rescale_saturating(self.value as i128, self.timescale as i128, 1000)
    }

    /// Seconds as a float, for engine arguments and logging only.
    pub fn as_secs_f64(self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Express this time in another timescale.
    pub fn convert_scale(self, timescale: u32) -> Self {
        Self {
            value: rescale_saturating(
                self.value as i128,
                self.timescale as i128,
                timescale as i128,
            ),
            timescale,
        }
    }

    /// Divide a duration by a playback-rate multiplier, rounding to the
    /// nearest tick. The multiplier must be finite and positive.
    pub fn div_rate(self, multiplier: f64) -> Self {
        Self {
            value: (self.value as f64 / multiplier).round() as i64,
            timescale: self.timescale,
        }
    }

    pub fn is_negative(self) -> bool {
        self.value < 0
    }

    /// The larger of two times.
    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Ratio `self / other` as a float. Returns 1.0 when `other` is zero.
    pub fn ratio(self, other: Self) -> f64 {
        let other = other.convert_scale(self.timescale);
        if other.value == 0 {
            1.0
        } else {
            self.value as f64 / other.value as f64
        }
    }
}

/// `value * to / from`, rounded half away from zero. `None` when the result
/// leaves the `i64` range.
fn rescale(value: i128, from: i128, to: i128) -> Option<i64> {
    let num = value * to;
    let half = from / 2;
    let rounded = if num >= 0 {
        (num + half) / from
    } else {
        (num - half) / from
    };
    i64::try_from(rounded).ok()
}

fn rescale_saturating(value: i128, from: i128, to: i128) -> i64 {
    rescale(value, from, to).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

impl PartialEq for NativeTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NativeTime {}

impl PartialOrd for NativeTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NativeTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

impl Add for NativeTime {
    type Output = NativeTime;

    fn add(self, rhs: NativeTime) -> NativeTime {
        let rhs = rhs.convert_scale(self.timescale);
        NativeTime::new(self.value + rhs.value, self.timescale)
    }
}

impl Sub for NativeTime {
    type Output = NativeTime;

    fn sub(self, rhs: NativeTime) -> NativeTime {
        let rhs = rhs.convert_scale(self.timescale);
        NativeTime::new(self.value - rhs.value, self.timescale)
    }
}

impl fmt::Display for NativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// A half-open span `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NativeTime,
    pub duration: NativeTime,
}

impl TimeRange {
    pub fn new(start: NativeTime, duration: NativeTime) -> Self {
        Self { start, duration }
    }

    /// Range from `start` up to (excluding) `end`.
    pub fn from_bounds(start: NativeTime, end: NativeTime) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    pub fn end(&self) -> NativeTime {
        self.start + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_millis_round_trip_default_scale() {
        let t = NativeTime::from_millis(1_234, DEFAULT_TIMESCALE);
        assert_eq!(t.value, 111_060);
        assert_eq!(t.to_millis(), 1_234);
    }

    #[test]
    fn test_non_multiple_timescale_rounds() {
        // 600 ticks/s: 1 ms = 0.6 ticks
        let t = NativeTime::from_millis(1, 600);
        assert_eq!(t.value, 1);
        assert_eq!(NativeTime::new(1, 600).to_millis(), 2);
    }

    #[test]
    fn test_cross_scale_comparison_and_arithmetic() {
        let a = NativeTime::new(1, 1);
        let b = NativeTime::new(90_000, DEFAULT_TIMESCALE);
        assert_eq!(a, b);

        let sum = b + NativeTime::from_millis(500, 1000);
        assert_eq!(sum.timescale, DEFAULT_TIMESCALE);
        assert_eq!(sum.to_millis(), 1_500);
        assert_eq!((sum - a).to_millis(), 500);
    }

    #[test]
    fn test_oversized_millis_do_not_wrap() {
        let huge = 1_000_000_000_000_000_000;
        assert_eq!(NativeTime::checked_from_millis(huge, DEFAULT_TIMESCALE), None);
        assert_eq!(NativeTime::from_millis(huge, DEFAULT_TIMESCALE).value, i64::MAX);
        assert_eq!(NativeTime::from_millis(-huge, DEFAULT_TIMESCALE).value, i64::MIN);
        assert_eq!(
            NativeTime::checked_from_millis(1_000, DEFAULT_TIMESCALE),
            Some(NativeTime::new(90_000, DEFAULT_TIMESCALE))
        );
    }

    #[test]
    fn test_div_rate() {
        let d = NativeTime::from_millis(10_000, DEFAULT_TIMESCALE);
        assert_eq!(d.div_rate(2.0).to_millis(), 5_000);
        assert_eq!(d.div_rate(0.5).to_millis(), 20_000);
        assert_eq!(d.div_rate(1.0), d);
    }

    #[test]
    fn test_time_range_end() {
        let r = TimeRange::from_bounds(
            NativeTime::from_millis(1_000, DEFAULT_TIMESCALE),
            NativeTime::from_millis(3_500, DEFAULT_TIMESCALE),
        );
        assert_eq!(r.duration.to_millis(), 2_500);
        assert_eq!(r.end().to_millis(), 3_500);
    }

    proptest! {
        #[test]
        fn prop_millis_conversion_is_exact(ms in -1_000_000_000i64..1_000_000_000i64) {
            let t = NativeTime::from_millis(ms, DEFAULT_TIMESCALE);
            prop_assert_eq!(t.to_millis(), ms);
            // repeated conversions do not drift
            let again = NativeTime::from_millis(t.to_millis(), DEFAULT_TIMESCALE);
            prop_assert_eq!(again.value, t.value);
        }
    }
}
