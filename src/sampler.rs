use rand::Rng;

use crate::config::MAX_SAMPLE_RATE;

/// Admission-control predicate deciding whether an observation is kept.
///
/// Implementations must be safe to call concurrently from multiple observation
/// sites. Rejection is an expected outcome, not an error.
pub trait Sampling: Send + Sync {
    /// Returns `true` when the observation should be admitted to the buffer.
    fn should_insert(&self) -> bool;
}

/// Stateless Bernoulli sampler driven by the configured sample rate.
///
/// Each call draws a uniform value in `[0, 100)` and keeps the observation
/// when it falls below the rate: rate 100 admits everything, rate 1 admits
/// roughly 1% of observations.
pub struct RateSampler {
    sample_rate: u32,
}

impl RateSampler {
    /// Create a sampler for the given rate.
    pub fn new(sample_rate: u32) -> Self {
        RateSampler { sample_rate }
    }
}

impl Sampling for RateSampler {
    fn should_insert(&self) -> bool {
        if self.sample_rate >= MAX_SAMPLE_RATE {
            return true;
        }
        rand::rng().random_range(0..MAX_SAMPLE_RATE) < self.sample_rate
    }
}
