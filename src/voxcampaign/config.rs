//! Runtime configuration for voxcampaign.
//!
//! This struct is intentionally minimal and is populated from environment
//! variables rather than a config-file format — there is no TOML/YAML
//! parsing dependency in this crate, matching how the rest of the ambient
//! stack favors plain structs over configuration DSLs.
//!
//! # Example
//!
//! ```rust
//! use voxcampaign::config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.max_concurrent_calls_per_org, 20);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the orchestrator, pipeline, and telephony
/// layers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory where per-run ledgers (`ledger::Chain` `.jsonl` files) are
    /// stored.
    pub ledger_dir: PathBuf,
    /// Maximum number of calls a single organization may have dialing
    /// concurrently.
    pub max_concurrent_calls_per_org: usize,
    /// Number of consecutive recent-call failures within
    /// `circuit_breaker_window` that trips the breaker for an organization.
    pub circuit_breaker_failure_threshold: u32,
    /// Rolling window the circuit breaker counts failures over.
    pub circuit_breaker_window: Duration,
    /// How long a tripped circuit breaker stays open before allowing a
    /// trial call through.
    pub circuit_breaker_cooldown: Duration,
    /// Number of attempts (including the first) made for a call before it
    /// is marked permanently failed.
    pub max_call_attempts: u32,
    /// Base delay for the retry backoff between call attempts.
    pub retry_backoff_base: Duration,
    /// Scheduler poll interval.
    pub scheduler_tick_interval: Duration,
    /// How long a batch may run before `_check_stale_campaigns`-equivalent
    /// logic considers it stuck.
    pub batch_stale_after: Duration,
    /// Bind address for the optional HTTP API (`server` feature).
    pub http_bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger_dir: PathBuf::from("call_ledgers"),
            max_concurrent_calls_per_org: 20,
            circuit_breaker_failure_threshold: 10,
            circuit_breaker_window: Duration::from_secs(300),
            circuit_breaker_cooldown: Duration::from_secs(600),
            max_call_attempts: 3,
            retry_backoff_base: Duration::from_secs(30),
            scheduler_tick_interval: Duration::from_secs(15),
            batch_stale_after: Duration::from_secs(300),
            http_bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparseable.
    ///
    /// Recognized variables: `VOXCAMPAIGN_LEDGER_DIR`,
    /// `VOXCAMPAIGN_MAX_CONCURRENT_CALLS_PER_ORG`,
    /// `VOXCAMPAIGN_CIRCUIT_BREAKER_FAILURE_THRESHOLD`,
    /// `VOXCAMPAIGN_CIRCUIT_BREAKER_WINDOW_SECONDS`,
    /// `VOXCAMPAIGN_CIRCUIT_BREAKER_COOLDOWN_SECONDS`,
    /// `VOXCAMPAIGN_MAX_CALL_ATTEMPTS`, `VOXCAMPAIGN_HTTP_BIND_ADDR`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ledger_dir: env::var("VOXCAMPAIGN_LEDGER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.ledger_dir),
            max_concurrent_calls_per_org: env_parsed("VOXCAMPAIGN_MAX_CONCURRENT_CALLS_PER_ORG")
                .unwrap_or(defaults.max_concurrent_calls_per_org),
            circuit_breaker_failure_threshold: env_parsed("VOXCAMPAIGN_CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                .unwrap_or(defaults.circuit_breaker_failure_threshold),
            circuit_breaker_window: env_parsed("VOXCAMPAIGN_CIRCUIT_BREAKER_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.circuit_breaker_window),
            circuit_breaker_cooldown: env_parsed("VOXCAMPAIGN_CIRCUIT_BREAKER_COOLDOWN_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.circuit_breaker_cooldown),
            max_call_attempts: env_parsed("VOXCAMPAIGN_MAX_CALL_ATTEMPTS").unwrap_or(defaults.max_call_attempts),
            retry_backoff_base: defaults.retry_backoff_base,
            scheduler_tick_interval: defaults.scheduler_tick_interval,
            batch_stale_after: defaults.batch_stale_after,
            http_bind_addr: env::var("VOXCAMPAIGN_HTTP_BIND_ADDR").unwrap_or(defaults.http_bind_addr),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_calls_per_org, 20);
        assert_eq!(config.circuit_breaker_failure_threshold, 10);
        assert_eq!(config.ledger_dir, PathBuf::from("call_ledgers"));
    }

    #[test]
    fn from_env_falls_back_to_defaults_for_unset_vars() {
        env::remove_var("VOXCAMPAIGN_MAX_CALL_ATTEMPTS");
        let config = Config::from_env();
        assert_eq!(config.max_call_attempts, 3);
    }
}
