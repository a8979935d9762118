//! Simulation time.
//!
//! Simulation time is a dimensionless, non-negative and finite real number.
//! The unit is whatever the model says it is: the weight-loss clinic demo, for
//! instance, counts minutes.
//!
//! [`SimTime`] is an instant of simulation time. Unlike a bare `f64` it is
//! totally ordered, which is what makes it usable as an event calendar key:
//! the NaN and infinite values that would break the ordering can never be
//! stored in a `SimTime`.
//!
//! Durations are plain `f64` values. They are validated where they are
//! consumed, see [`Context::timeout`](crate::process::Context::timeout).

use std::cmp::Ordering;
use std::fmt;

/// An instant of simulation time.
///
/// # Examples
///
/// ```
/// use procsim::time::SimTime;
///
/// let t0 = SimTime::ZERO;
/// let t1 = t0.checked_add(2.5).unwrap();
///
/// assert!(t0 < t1);
/// assert_eq!(t1.duration_since(t0), Some(2.5));
/// assert_eq!(SimTime::new(-1.0), None);
/// ```
#[derive(Clone, Copy, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "f64", into = "f64")
)]
pub struct SimTime(f64);

impl SimTime {
    /// The origin of simulation time.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Creates a timestamp, or returns `None` if `value` is negative, NaN or
    /// infinite.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            // Normalize negative zero so that `Eq` and `Hash`-like uses agree.
            Some(SimTime(value + 0.0))
        } else {
            None
        }
    }

    /// Returns the timestamp as a floating point value.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns the instant `duration` after `self`.
    ///
    /// Returns `None` if `duration` is negative, NaN or infinite, or if the
    /// result is not a finite number.
    pub fn checked_add(self, duration: f64) -> Option<Self> {
        if !(duration.is_finite() && duration >= 0.0) {
            return None;
        }

        SimTime::new(self.0 + duration)
    }

    /// Returns the duration elapsed between `earlier` and `self`, or `None`
    /// if `earlier` is after `self`.
    pub fn duration_since(self, earlier: SimTime) -> Option<f64> {
        if earlier <= self {
            Some(self.0 - earlier.0)
        } else {
            None
        }
    }

    /// Returns the duration elapsed between `earlier` and `self`, or zero if
    /// `earlier` is after `self`.
    pub fn saturating_duration_since(self, earlier: SimTime) -> f64 {
        self.duration_since(earlier).unwrap_or(0.0)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<u32> for SimTime {
    fn from(value: u32) -> Self {
        SimTime(value as f64)
    }
}

impl From<SimTime> for f64 {
    fn from(time: SimTime) -> Self {
        time.0
    }
}

impl TryFrom<f64> for SimTime {
    type Error = InvalidTimeValue;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        SimTime::new(value).ok_or(InvalidTimeValue(value))
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({})", self.0)
    }
}

/// Honors the precision flag, so `{:.1}` prints one decimal.
impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The error returned when converting a negative, NaN or infinite value to a
/// [`SimTime`].
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("{0} is not a valid simulation time")]
pub struct InvalidTimeValue(pub f64);
