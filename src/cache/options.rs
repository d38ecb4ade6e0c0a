//! Freshness, eviction and retry settings for a cached query.

use std::time::Duration;

/// Upper bound on the pause between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Per-query cache policy.
///
/// A value younger than `stale_after` is served straight from the cache. Once
/// it is `evict_after` old the entry is dropped entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  pub stale_after: Duration,
  pub evict_after: Duration,
  /// Extra attempts after the first failure.
  pub retry_limit: u32,
  /// Delay before the first retry, doubled for each following one.
  pub retry_delay: Duration,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_after: Duration::ZERO,
      evict_after: Duration::from_secs(5 * 60),
      retry_limit: 1,
      retry_delay: Duration::from_secs(1),
    }
  }
}

impl QueryOptions {
  pub fn new(stale_after: Duration, evict_after: Duration) -> Self {
    Self {
      stale_after,
      evict_after,
      ..Self::default()
    }
  }

  pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
    self.retry_limit = retry_limit;
    self
  }

  #[cfg(test)]
  pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
    self.retry_delay = retry_delay;
    self
  }

  /// Pause before retry number `attempt` (zero based).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    self
      .retry_delay
      .checked_mul(factor)
      .unwrap_or(MAX_RETRY_DELAY)
      .min(MAX_RETRY_DELAY)
  }
}
