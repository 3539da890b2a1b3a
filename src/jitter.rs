// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Jittered sleep intervals for the trigger loops.
//!
//! Every loop sleeps between iterations for a fixed base interval with uniform
//! jitter, so replicas and loops do not hit the API servers in lockstep. There is
//! no exponential growth and no attempt ceiling: a loop that keeps failing keeps
//! retrying at roughly the same pace.

use crate::constants::JITTER_FACTOR;
use rand::Rng;
use std::time::Duration;

/// Fixed-base interval with uniform jitter.
///
/// Each call to [`JitteredInterval::next_sleep`] returns a duration uniformly
/// distributed in `[base - factor*base, base + factor*base)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitteredInterval {
    /// Base interval duration
    pub base: Duration,
    /// Randomization factor (e.g., 0.25 for ±25%)
    pub randomization_factor: f64,
}

impl JitteredInterval {
    /// Create an interval with the default ±25% jitter.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            randomization_factor: JITTER_FACTOR,
        }
    }

    /// Lower bound of the generated sleeps (inclusive).
    #[must_use]
    pub fn min(&self) -> Duration {
        self.base.mul_f64(1.0 - self.randomization_factor)
    }

    /// Upper bound of the generated sleeps (exclusive).
    #[must_use]
    pub fn max(&self) -> Duration {
        self.base.mul_f64(1.0 + self.randomization_factor)
    }

    /// Draw the next sleep duration.
    #[must_use]
    pub fn next_sleep(&self) -> Duration {
        apply_jitter(self.base, self.randomization_factor)
    }
}

/// Apply uniform jitter to an interval.
///
/// Computes `base - factor*base + random(0, 2*factor*base)`, which for the default
/// factor of 0.25 is uniform in `[0.75*base, 1.25*base)`.
#[must_use]
pub fn apply_jitter(base: Duration, randomization_factor: f64) -> Duration {
    let secs = base.as_secs_f64();
    let delta = secs * randomization_factor;

    if delta <= 0.0 {
        return base;
    }

    let offset = rand::rng().random_range(0.0..2.0 * delta);
    Duration::from_secs_f64((secs - delta + offset).max(0.0))
}

#[cfg(test)]
#[path = "jitter_tests.rs"]
mod jitter_tests;
