//! Per-campaign circuit breaker: trips when the failure rate within a
//! trailing window crosses a threshold, after enough calls have been made
//! for the rate to be meaningful. Tripping is a one-way signal the caller
//! (the campaign orchestrator) must act on by pausing the campaign —
//! checking the breaker never mutates campaign state on its own.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use bus::SlidingWindowCounter;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub window: Duration,
    pub failure_threshold: f64,
    pub min_calls_in_window: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(300),
            failure_threshold: 0.5,
            min_calls_in_window: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerStats {
    pub failure_count: usize,
    pub success_count: usize,
    pub failure_rate: f64,
}

struct Windows {
    failures: SlidingWindowCounter,
    successes: SlidingWindowCounter,
}

/// Tracks one sliding failure/success window per campaign. Cheap to share:
/// clone and hand to every task that records call outcomes.
#[derive(Clone)]
pub struct CircuitBreaker {
    windows: Arc<DashMap<Uuid, Windows>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { windows: Arc::new(DashMap::new()) }
    }

    fn windows_for(&self, campaign_id: Uuid, window: Duration) -> Arc<DashMap<Uuid, Windows>> {
        self.windows.entry(campaign_id).or_insert_with(|| Windows {
            failures: SlidingWindowCounter::new(window),
            successes: SlidingWindowCounter::new(window),
        });
        self.windows.clone()
    }

    fn stats(failures: usize, successes: usize) -> CircuitBreakerStats {
        let total = failures + successes;
        let failure_rate = if total == 0 { 0.0 } else { failures as f64 / total as f64 };
        CircuitBreakerStats { failure_count: failures, success_count: successes, failure_rate }
    }

    /// Record one call outcome and report whether the breaker has just
    /// tripped as a result. Returns `None` for stats if the breaker is
    /// disabled.
    pub async fn record_call_outcome(&self, campaign_id: Uuid, is_failure: bool, config: CircuitBreakerConfig) -> (bool, Option<CircuitBreakerStats>) {
        if !config.enabled {
            return (false, None);
        }
        let map = self.windows_for(campaign_id, config.window);
        let entry = map.get(&campaign_id).unwrap();

        let (failures, successes) = if is_failure {
            (entry.failures.record().await, entry.successes.count().await)
        } else {
            (entry.failures.count().await, entry.successes.record().await)
        };

        let stats = Self::stats(failures, successes);
        let total = failures + successes;
        let tripped = total >= config.min_calls_in_window && stats.failure_rate >= config.failure_threshold;
        if tripped {
            warn!(campaign_id = %campaign_id, failure_rate = stats.failure_rate, failures, successes, "circuit breaker tripped");
        }
        (tripped, Some(stats))
    }

    /// Check whether the breaker is currently open, without recording a new
    /// outcome. Used as a safety-net check before scheduling a batch.
    pub async fn is_open(&self, campaign_id: Uuid, config: CircuitBreakerConfig) -> (bool, Option<CircuitBreakerStats>) {
        if !config.enabled {
            return (false, None);
        }
        let Some(entry) = self.windows.get(&campaign_id) else {
            return (false, Some(Self::stats(0, 0)));
        };
        let failures = entry.failures.count().await;
        let successes = entry.successes.count().await;
        let stats = Self::stats(failures, successes);
        let total = failures + successes;
        let open = total >= config.min_calls_in_window && stats.failure_rate >= config.failure_threshold;
        (open, Some(stats))
    }

    /// Clear a campaign's window, giving it a clean slate (called when a
    /// paused campaign is resumed).
    pub async fn reset(&self, campaign_id: Uuid) {
        if let Some(entry) = self.windows.get(&campaign_id) {
            entry.failures.reset().await;
            entry.successes.reset().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig { enabled: true, window: Duration::from_secs(300), failure_threshold: 0.5, min_calls_in_window: 4 }
    }

    #[tokio::test]
    async fn does_not_trip_below_the_minimum_call_count() {
        let breaker = CircuitBreaker::new();
        let campaign_id = Uuid::new_v4();
        let (tripped, _) = breaker.record_call_outcome(campaign_id, true, config()).await;
        assert!(!tripped);
    }

    #[tokio::test]
    async fn trips_once_failure_rate_crosses_the_threshold_with_enough_calls() {
        let breaker = CircuitBreaker::new();
        let campaign_id = Uuid::new_v4();
        breaker.record_call_outcome(campaign_id, true, config()).await;
        breaker.record_call_outcome(campaign_id, true, config()).await;
        breaker.record_call_outcome(campaign_id, false, config()).await;
        let (tripped, stats) = breaker.record_call_outcome(campaign_id, true, config()).await;
        assert!(tripped);
        assert_eq!(stats.unwrap().failure_count, 3);
    }

    #[tokio::test]
    async fn a_high_success_rate_never_trips() {
        let breaker = CircuitBreaker::new();
        let campaign_id = Uuid::new_v4();
        for _ in 0..10 {
            breaker.record_call_outcome(campaign_id, false, config()).await;
        }
        let (tripped, _) = breaker.record_call_outcome(campaign_id, true, config()).await;
        assert!(!tripped);
    }

    #[tokio::test]
    async fn disabled_breaker_never_trips() {
        let breaker = CircuitBreaker::new();
        let campaign_id = Uuid::new_v4();
        let mut cfg = config();
        cfg.enabled = false;
        for _ in 0..20 {
            let (tripped, stats) = breaker.record_call_outcome(campaign_id, true, cfg).await;
            assert!(!tripped);
            assert!(stats.is_none());
        }
    }

    #[tokio::test]
    async fn reset_clears_accumulated_failures() {
        let breaker = CircuitBreaker::new();
        let campaign_id = Uuid::new_v4();
        for _ in 0..4 {
            breaker.record_call_outcome(campaign_id, true, config()).await;
        }
        breaker.reset(campaign_id).await;
        let (open, stats) = breaker.is_open(campaign_id, config()).await;
        assert!(!open);
        assert_eq!(stats.unwrap().failure_count, 0);
    }
}
