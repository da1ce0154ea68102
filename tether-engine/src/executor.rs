//! Resume executor: drives the external runner for a set of work units.
//!
//! The executor is a boundary: whatever the runner does — fail some units,
//! leave some skipped, or error outright — the outcome comes back as a
//! value. Nothing here propagates an error to the scheduler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::config::EngineConfig;
use tether_core::error::Result;
use tether_core::types::ScopeKey;

/// Type alias for async runner futures.
pub type RunnerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Per-unit result reported by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// The unit ran to completion.
    Passed,
    /// The unit ran and failed.
    Failed,
    /// The unit remained skipped (it never re-entered execution).
    Skipped,
}

/// A bounded execution request handed to the external runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// The work units to execute, duplicate-free, in input order.
    pub targets: Vec<ScopeKey>,
    /// Resume mode: the units are re-entries of paused work, so idempotent
    /// step skipping applies.
    pub resume: bool,
    /// Parallelism degree, when parallel resume is enabled.
    pub parallelism: Option<usize>,
}

/// Per-unit report from one runner invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Status per executed unit.
    pub units: HashMap<ScopeKey, UnitStatus>,
}

impl RunReport {
    /// Record one unit's status.
    #[must_use]
    pub fn with_unit(mut self, key: ScopeKey, status: UnitStatus) -> Self {
        self.units.insert(key, status);
        self
    }

    fn count(&self, status: UnitStatus) -> usize {
        self.units.values().filter(|s| **s == status).count()
    }
}

/// External runner port: execute exactly the requested units and report
/// pass/fail/skip per unit. An `Err` from the runner is treated by the
/// executor as a failed sweep, not a partial result.
pub trait WorkRunner: Send + Sync {
    /// Run the requested units.
    fn run(&self, request: RunRequest) -> RunnerFuture<'_, RunReport>;
}

/// Classification of one executor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// No failures and nothing still skipped.
    Success,
    /// Some units failed or remained skipped; reported, not thrown.
    Partial,
    /// The runner errored (or was unavailable); captured, not propagated.
    Failed,
}

/// Aggregated outcome of one executor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The overall classification.
    pub outcome: Outcome,
    /// Number of distinct targets requested.
    pub targets: usize,
    /// Units the runner reported as failed.
    pub failed_units: usize,
    /// Units the runner reported as still skipped.
    pub skipped_units: usize,
    /// Wall time of the runner invocation.
    pub elapsed: Duration,
    /// The captured runner error, for the `Failed` outcome.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// The canonical no-op success for empty input.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            outcome: Outcome::Success,
            targets: 0,
            failed_units: 0,
            skipped_units: 0,
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    fn failed(targets: usize, elapsed: Duration, error: String) -> Self {
        Self {
            outcome: Outcome::Failed,
            targets,
            failed_units: 0,
            skipped_units: 0,
            elapsed,
            error: Some(error),
        }
    }

    /// Whether the invocation should count as a successful sweep for retry
    /// accounting (`Success` or `Partial`).
    #[must_use]
    pub fn is_sweep_success(&self) -> bool {
        self.outcome != Outcome::Failed
    }
}

/// Builds bounded run requests and drives the external runner.
pub struct ResumeExecutor {
    runner: Option<Arc<dyn WorkRunner>>,
    parallelism: Option<usize>,
    runner_id: String,
}

impl ResumeExecutor {
    /// Create an executor over a runner.
    #[must_use]
    pub fn new(runner: Arc<dyn WorkRunner>) -> Self {
        Self {
            runner: Some(runner),
            parallelism: None,
            runner_id: "default".to_string(),
        }
    }

    /// Create an executor with no runner configured.
    ///
    /// Every non-empty execution returns a `Failed` result; useful for
    /// wiring checks and tests.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            runner: None,
            parallelism: None,
            runner_id: "default".to_string(),
        }
    }

    /// Apply the runner identity and parallel-resume settings from a config.
    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.parallelism = config.parallel_resume.then_some(config.resume_threads);
        self.runner_id = config.runner_id.clone();
        self
    }

    /// Identifier of the runner collaborator, for log attribution.
    #[must_use]
    pub fn runner_id(&self) -> &str {
        &self.runner_id
    }

    /// Execute the given work units via the external runner.
    ///
    /// Duplicates are removed preserving input order. Empty input returns
    /// the canonical no-op success without invoking the runner. A missing
    /// or erroring runner produces a `Failed` result — never a panic and
    /// never an `Err`.
    pub async fn execute(&self, scope_keys: &[ScopeKey]) -> ExecutionResult {
        let mut seen = std::collections::HashSet::new();
        let targets: Vec<ScopeKey> = scope_keys
            .iter()
            .filter(|k| seen.insert((*k).clone()))
            .cloned()
            .collect();

        if targets.is_empty() {
            tracing::debug!("Resume execution requested with no targets, nothing to do");
            return ExecutionResult::noop();
        }

        let Some(runner) = &self.runner else {
            tracing::error!(
                runner_id = %self.runner_id,
                targets = targets.len(),
                "No runner configured, resume execution failed"
            );
            return ExecutionResult::failed(
                targets.len(),
                Duration::ZERO,
                "runner collaborator is not configured".to_string(),
            );
        };

        let request = RunRequest {
            targets: targets.clone(),
            resume: true,
            parallelism: self.parallelism,
        };
        let target_count = targets.len();
        let started = Instant::now();

        match runner.run(request).await {
            Ok(report) => {
                let elapsed = started.elapsed();
                let failed_units = report.count(UnitStatus::Failed);
                let skipped_units = report.count(UnitStatus::Skipped);
                let outcome = if failed_units == 0 && skipped_units == 0 {
                    Outcome::Success
                } else {
                    Outcome::Partial
                };
                tracing::info!(
                    runner_id = %self.runner_id,
                    targets = target_count,
                    failed = failed_units,
                    skipped = skipped_units,
                    elapsed_ms = elapsed.as_millis() as u64,
                    outcome = ?outcome,
                    "Resume execution finished"
                );
                ExecutionResult {
                    outcome,
                    targets: target_count,
                    failed_units,
                    skipped_units,
                    elapsed,
                    error: None,
                }
            }
            Err(e) => {
                let elapsed = started.elapsed();
                tracing::error!(
                    runner_id = %self.runner_id,
                    targets = target_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Runner error during resume execution"
                );
                ExecutionResult::failed(target_count, elapsed, e.to_string())
            }
        }
    }

    /// Convenience wrapper: execute a single work unit.
    pub async fn execute_single(&self, scope_key: &ScopeKey) -> ExecutionResult {
        self.execute(std::slice::from_ref(scope_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRunner, RunnerBehavior};

    fn keys(names: &[&str]) -> Vec<ScopeKey> {
        names.iter().map(|n| ScopeKey::new(*n)).collect()
    }

    #[tokio::test]
    async fn empty_input_is_noop_success() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::PassAll));
        let executor = ResumeExecutor::new(runner.clone());

        let result = executor.execute(&[]).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.targets, 0);
        assert!(runner.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn duplicates_removed_preserving_order() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::PassAll));
        let executor = ResumeExecutor::new(runner.clone());

        let result = executor.execute(&keys(&["b", "a", "b", "c", "a"])).await;
        assert_eq!(result.targets, 3);

        let calls = runner.calls.lock();
        assert_eq!(calls[0].targets, keys(&["b", "a", "c"]));
        assert!(calls[0].resume);
    }

    #[tokio::test]
    async fn unconfigured_runner_fails_without_throwing() {
        let executor = ResumeExecutor::unconfigured();
        let result = executor.execute(&keys(&["a"])).await;
        assert_eq!(result.outcome, Outcome::Failed);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn all_passed_is_success() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::PassAll));
        let executor = ResumeExecutor::new(runner);

        let result = executor.execute(&keys(&["a", "b"])).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.is_sweep_success());
    }

    #[tokio::test]
    async fn failed_unit_is_partial() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::FailUnit(
            ScopeKey::new("b"),
        )));
        let executor = ResumeExecutor::new(runner);

        let result = executor.execute(&keys(&["a", "b"])).await;
        assert_eq!(result.outcome, Outcome::Partial);
        assert_eq!(result.failed_units, 1);
        // Partial is reported, not thrown: still a sweep success.
        assert!(result.is_sweep_success());
    }

    #[tokio::test]
    async fn remaining_skip_is_partial() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::SkipUnit(
            ScopeKey::new("a"),
        )));
        let executor = ResumeExecutor::new(runner);

        let result = executor.execute(&keys(&["a", "b"])).await;
        assert_eq!(result.outcome, Outcome::Partial);
        assert_eq!(result.skipped_units, 1);
    }

    #[tokio::test]
    async fn runner_error_is_captured_not_propagated() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::Error));
        let executor = ResumeExecutor::new(runner);

        let result = executor.execute(&keys(&["a"])).await;
        assert_eq!(result.outcome, Outcome::Failed);
        assert!(!result.is_sweep_success());
        assert!(result.error.unwrap().contains("runner exploded"));
    }

    #[tokio::test]
    async fn execute_single_wraps_one_key() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::PassAll));
        let executor = ResumeExecutor::new(runner.clone());

        let result = executor.execute_single(&ScopeKey::new("only")).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.targets, 1);
        assert_eq!(runner.calls.lock()[0].targets, keys(&["only"]));
    }

    #[tokio::test]
    async fn runner_identity_comes_from_config() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::PassAll));
        let config = EngineConfig::default().with_runner_id("ci-runner");
        let executor = ResumeExecutor::new(runner).with_config(&config);
        assert_eq!(executor.runner_id(), "ci-runner");
    }

    #[tokio::test]
    async fn parallelism_comes_from_config() {
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::PassAll));
        let config = EngineConfig::default().with_parallel_resume(6);
        let executor = ResumeExecutor::new(runner.clone()).with_config(&config);

        executor.execute(&keys(&["a"])).await;
        assert_eq!(runner.calls.lock()[0].parallelism, Some(6));
    }
}
