//! Reconnect delays
//!
//! Transient failures back off exponentially with jitter; non-resumable
//! session invalidations wait a uniform short delay before the fresh
//! identify, per the gateway's Invalid Session guidance.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_SHIFT: u32 = 16;

/// Tuning for the reconnect controller.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    pub base: Duration,

    /// Upper bound on the exponential delay.
    pub cap: Duration,

    /// Lower bound of the delay after a non-resumable invalidation.
    pub invalid_session_min: Duration,

    /// Upper bound of the delay after a non-resumable invalidation.
    /// Must not be below `invalid_session_min`.
    pub invalid_session_max: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            invalid_session_min: Duration::from_secs(1),
            invalid_session_max: Duration::from_secs(5),
        }
    }
}

/// Delay source owned by the reconnect controller.
///
/// Jitter comes from an instance-local generator so the client never
/// perturbs any process-wide randomness the host program relies on.
pub(crate) struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
    rng: StdRng,
}

impl Backoff {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// The next exponential delay: `min(base * 2^attempts, cap)` plus up
    /// to one second of jitter.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let exponential = self
            .config
            .base
            .saturating_mul(1u32 << self.attempts.min(MAX_SHIFT));
        let delay = exponential.min(self.config.cap);
        self.attempts = self.attempts.saturating_add(1);
        delay + Duration::from_secs_f64(self.rng.gen::<f64>())
    }

    /// A uniform delay from the invalid-session range.
    pub(crate) fn invalid_session_delay(&mut self) -> Duration {
        let min = self.config.invalid_session_min.as_secs_f64();
        let max = self.config.invalid_session_max.as_secs_f64();
        Duration::from_secs_f64(self.rng.gen_range(min..=max))
    }

    /// Called after a successful READY or RESUMED.
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
    }
}
