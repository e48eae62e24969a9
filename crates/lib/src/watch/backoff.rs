//! Exponential backoff for failed reconciliations.

use std::time::Duration;

use tokio::time::Instant;

/// Delay schedule: `base * factor^attempt`, capped at `max`, for at most
/// `max_elapsed` since the first failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
  pub base: Duration,
  pub factor: u32,
  pub max: Duration,
  pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
  fn default() -> Self {
    Self {
      base: Duration::from_secs(1),
      factor: 2,
      max: Duration::from_secs(60),
      max_elapsed: Duration::from_secs(10 * 60),
    }
  }
}

impl BackoffPolicy {
  /// Delay before retry number `attempt` (0-based).
  pub fn delay(&self, attempt: u32) -> Duration {
    let multiplier = self.factor.checked_pow(attempt).unwrap_or(u32::MAX);
    self.base.checked_mul(multiplier).unwrap_or(self.max).min(self.max)
  }
}

/// Retry state for one change.
#[derive(Debug)]
pub struct Backoff {
  policy: BackoffPolicy,
  started: Instant,
  attempt: u32,
}

impl Backoff {
  pub fn new(policy: BackoffPolicy) -> Self {
    Self {
      policy,
      started: Instant::now(),
      attempt: 0,
    }
  }

  /// Delay before the next retry, or `None` once the elapsed budget is spent.
  pub fn next_delay(&mut self) -> Option<Duration> {
    let delay = self.policy.delay(self.attempt);
    if self.started.elapsed() + delay > self.policy.max_elapsed {
      return None;
    }
    self.attempt += 1;
    Some(delay)
  }

  pub fn attempts(&self) -> u32 {
    self.attempt
  }
}
