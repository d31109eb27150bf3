//! Bounded exponential backoff for transient executor failures.

use crate::autopilot_config::RetrySection;
use crate::errors::ExecutionError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; zero behaves like one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fractional spread applied to each delay, clamped to 0.0-1.0
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySection::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySection) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_secs(settings.base_delay_secs),
            max_delay: Duration::from_secs(settings.max_delay_secs),
            jitter: settings.jitter,
        }
    }

    /// A policy that never sleeps; used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay after the `attempt`-th failure (1-based), jittered.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
        self.delay_with(attempt, unit)
    }

    /// Delay for `attempt` with an explicit jitter sample in [-1, 1].
    pub fn delay_with(&self, attempt: u32, unit: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay);
        let capped = raw.min(self.max_delay);

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = (1.0 + jitter * unit.clamp(-1.0, 1.0)).max(0.0);
        capped.mul_f64(factor)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Only `Transient` errors are
    /// retried; the last error is returned when attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ExecutionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ExecutionError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
