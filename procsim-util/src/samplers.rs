//! Seeded random sources.
//!
//! This module contains [`RandomSource`] implementations for common duration
//! distributions. Every sampler owns its own ChaCha generator, so a seed fully
//! determines the sequence of durations it produces, independently of the
//! order in which other samplers are used.
//!
//! Samplers meant to feed independent streams, e.g. one per patient, should be
//! derived with `fork` rather than seeded by hand:
//!
//! ```
//! use procsim::random::RandomSource;
//! use procsim_util::samplers::Exponential;
//!
//! let mut arrivals = Exponential::new(5.0, 42)?;
//! let mut consultations = arrivals.fork_with_mean(6.0)?;
//!
//! assert!(arrivals.sample() >= 0.0);
//! assert!(consultations.sample() >= 0.0);
//! # Ok::<(), procsim_util::samplers::SamplerError>(())
//! ```

use std::fmt;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};

use procsim::random::RandomSource;

/// An error raised when a sampler is given invalid parameters.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum SamplerError {
    /// The mean of an exponential distribution must be finite and positive.
    #[error("invalid mean {0}: the mean must be finite and positive")]
    InvalidMean(f64),
    /// The bounds of a uniform distribution must be finite and ordered.
    #[error("invalid bounds [{low}, {high}]: bounds must be finite with low <= high")]
    InvalidBounds {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// A cyclic replay needs at least one sample.
    #[error("cannot cycle over an empty sample sequence")]
    EmptyReplay,
}

/// Exponentially distributed durations with a given mean.
#[derive(Clone)]
pub struct Exponential {
    mean: f64,
    dist: Exp<f64>,
    rng: ChaCha8Rng,
}

impl Exponential {
    /// Creates a sampler with the specified mean, seeded with `seed`.
    pub fn new(mean: f64, seed: u64) -> Result<Self, SamplerError> {
        Self::from_rng(mean, ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(mean: f64, rng: ChaCha8Rng) -> Result<Self, SamplerError> {
        if !(mean.is_finite() && mean > 0.0) {
            return Err(SamplerError::InvalidMean(mean));
        }
        let dist = Exp::new(1.0 / mean).map_err(|_| SamplerError::InvalidMean(mean))?;

        Ok(Self { mean, dist, rng })
    }

    /// Mean of the distribution.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Derives an independent sampler with the same mean.
    pub fn fork(&mut self) -> Self {
        Self {
            mean: self.mean,
            dist: self.dist,
            rng: ChaCha8Rng::seed_from_u64(self.rng.next_u64()),
        }
    }

    /// Derives an independent sampler with another mean.
    pub fn fork_with_mean(&mut self, mean: f64) -> Result<Self, SamplerError> {
        Self::from_rng(mean, ChaCha8Rng::seed_from_u64(self.rng.next_u64()))
    }
}

impl RandomSource for Exponential {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

impl fmt::Debug for Exponential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exponential")
            .field("mean", &self.mean)
            .finish_non_exhaustive()
    }
}

/// Uniformly distributed durations over `[low, high]`.
#[derive(Clone)]
pub struct Uniform {
    low: f64,
    high: f64,
    dist: rand_distr::Uniform<f64>,
    rng: ChaCha8Rng,
}

impl Uniform {
    /// Creates a sampler over `[low, high]`, seeded with `seed`.
    ///
    /// A degenerate range with `low == high` always yields `low`.
    pub fn new(low: f64, high: f64, seed: u64) -> Result<Self, SamplerError> {
        Self::from_rng(low, high, ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(low: f64, high: f64, rng: ChaCha8Rng) -> Result<Self, SamplerError> {
        if !(low.is_finite() && high.is_finite() && low <= high) {
            return Err(SamplerError::InvalidBounds { low, high });
        }

        Ok(Self {
            low,
            high,
            dist: rand_distr::Uniform::new_inclusive(low, high),
            rng,
        })
    }

    /// Derives an independent sampler over the same range.
    pub fn fork(&mut self) -> Self {
        Self {
            low: self.low,
            high: self.high,
            dist: self.dist.clone(),
            rng: ChaCha8Rng::seed_from_u64(self.rng.next_u64()),
        }
    }
}

impl RandomSource for Uniform {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

impl fmt::Debug for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uniform")
            .field("low", &self.low)
            .field("high", &self.high)
            .finish_non_exhaustive()
    }
}

/// Durations replayed from a recorded trace.
///
/// Once the trace is exhausted, a non-cyclic replay yields NaN, which a
/// timeout rejects as an invalid duration.
#[derive(Clone, Debug)]
pub struct Replay {
    samples: Vec<f64>,
    position: usize,
    cyclic: bool,
}

impl Replay {
    /// Replays `samples` once.
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            position: 0,
            cyclic: false,
        }
    }

    /// Replays `samples` in a loop.
    pub fn cyclic(samples: impl IntoIterator<Item = f64>) -> Result<Self, SamplerError> {
        let replay = Self {
            cyclic: true,
            ..Self::new(samples)
        };
        if replay.samples.is_empty() {
            return Err(SamplerError::EmptyReplay);
        }

        Ok(replay)
    }

    /// Number of samples left before the trace is exhausted or restarts.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl RandomSource for Replay {
    fn sample(&mut self) -> f64 {
        if self.position == self.samples.len() {
            if !self.cyclic {
                return f64::NAN;
            }
            self.position = 0;
        }
        let value = self.samples[self.position];
        self.position += 1;

        value
    }
}
