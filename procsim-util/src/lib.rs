//! Utilities for procsim simulations.
//!
//! * [`samplers`]: reproducibly seeded random sources,
//! * [`generator`]: arrival generators spawning entity processes.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod generator;
pub mod samplers;
