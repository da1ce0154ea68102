//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration consumed by the matcher, scheduler, and executor.
///
/// # Environment Variables
///
/// Every field can be overridden via `TETHER_*` variables, see
/// [`EngineConfig::from_env`]. Unparseable values fall back to the default
/// with a warning rather than failing startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed delay between scheduler sweeps, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum records per resume batch.
    pub batch_size: usize,
    /// Resume attempts before a record is abandoned.
    pub max_retries: u32,
    /// How long a waiter stays pending before timing out, in milliseconds.
    pub waiter_ttl_ms: u64,
    /// Whether the external runner may execute resume targets in parallel.
    pub parallel_resume: bool,
    /// Parallelism degree passed to the runner when `parallel_resume` is set.
    pub resume_threads: usize,
    /// Identifier of the external runner collaborator.
    pub runner_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            batch_size: 10,
            max_retries: 3,
            waiter_ttl_ms: 3_600_000,
            parallel_resume: false,
            resume_threads: 4,
            runner_id: "default".to_string(),
        }
    }
}

impl EngineConfig {
    /// Set the sweep interval.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the waiter TTL.
    #[must_use]
    pub fn with_waiter_ttl_ms(mut self, ms: u64) -> Self {
        self.waiter_ttl_ms = ms;
        self
    }

    /// Enable parallel resume with the given thread count.
    #[must_use]
    pub fn with_parallel_resume(mut self, threads: usize) -> Self {
        self.parallel_resume = true;
        self.resume_threads = threads;
        self
    }

    /// Set the runner collaborator identifier.
    #[must_use]
    pub fn with_runner_id(mut self, id: impl Into<String>) -> Self {
        self.runner_id = id.into();
        self
    }

    /// The sweep interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The waiter TTL as a [`Duration`].
    #[must_use]
    pub fn waiter_ttl(&self) -> Duration {
        Duration::from_millis(self.waiter_ttl_ms)
    }

    /// Build a config from `TETHER_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    ///
    /// # Environment Variables
    ///
    /// - `TETHER_POLL_INTERVAL_MS`
    /// - `TETHER_BATCH_SIZE`
    /// - `TETHER_MAX_RETRIES`
    /// - `TETHER_WAITER_TTL_MS`
    /// - `TETHER_PARALLEL_RESUME` (`true`/`false`)
    /// - `TETHER_RESUME_THREADS`
    /// - `TETHER_RUNNER_ID`
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval_ms: env_parsed("TETHER_POLL_INTERVAL_MS", defaults.poll_interval_ms),
            batch_size: env_parsed("TETHER_BATCH_SIZE", defaults.batch_size),
            max_retries: env_parsed("TETHER_MAX_RETRIES", defaults.max_retries),
            waiter_ttl_ms: env_parsed("TETHER_WAITER_TTL_MS", defaults.waiter_ttl_ms),
            parallel_resume: env_parsed("TETHER_PARALLEL_RESUME", defaults.parallel_resume),
            resume_threads: env_parsed("TETHER_RESUME_THREADS", defaults.resume_threads),
            runner_id: std::env::var("TETHER_RUNNER_ID").unwrap_or(defaults.runner_id),
        }
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.waiter_ttl(), Duration::from_secs(3600));
        assert!(!config.parallel_resume);
    }

    #[test]
    fn builder_chain() {
        let config = EngineConfig::default()
            .with_batch_size(5)
            .with_max_retries(1)
            .with_waiter_ttl_ms(50)
            .with_parallel_resume(8);

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.waiter_ttl(), Duration::from_millis(50));
        assert!(config.parallel_resume);
        assert_eq!(config.resume_threads, 8);
    }

    #[test]
    fn config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.batch_size, config.batch_size);
        assert_eq!(parsed.runner_id, config.runner_id);
    }

    #[test]
    fn from_env_bad_value_falls_back() {
        // SAFETY: no other test in this crate reads or writes the environment
        unsafe { std::env::set_var("TETHER_BATCH_SIZE", "not-a-number") };
        let config = EngineConfig::from_env();
        assert_eq!(config.batch_size, EngineConfig::default().batch_size);
        unsafe { std::env::remove_var("TETHER_BATCH_SIZE") };
    }
}
