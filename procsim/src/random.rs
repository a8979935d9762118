//! Sources of random durations.
//!
//! The engine does not sample random variates itself. Process bodies draw
//! durations from a [`RandomSource`] and pass them to
//! [`Context::timeout`](crate::process::Context::timeout), or hand the source
//! directly to [`Context::sampled_timeout`](crate::process::Context::sampled_timeout).
//!
//! A negative sample is not an error of the source: it is reported as
//! [`ProcessError::InvalidDuration`](crate::process::ProcessError::InvalidDuration)
//! by the timeout that consumes it.
//!
//! Reproducibility of a simulation depends on the source being seeded
//! reproducibly. The engine itself only guarantees that identical durations
//! produce an identical event order.

/// A supplier of durations.
///
/// Implemented for closures, which makes deterministic sources trivial to
/// write in tests:
///
/// ```
/// use procsim::random::RandomSource;
///
/// let mut next = 0.0;
/// let mut ramp = move || {
///     next += 1.0;
///     next
/// };
/// assert_eq!(ramp.sample(), 1.0);
/// assert_eq!(ramp.sample(), 2.0);
/// ```
pub trait RandomSource {
    /// Draws the next duration.
    fn sample(&mut self) -> f64;
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64,
{
    fn sample(&mut self) -> f64 {
        self()
    }
}
