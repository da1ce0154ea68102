//! Per-work-unit step state and the explicit execution context.

use crate::types::ScopeKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of one step of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step ran to completion.
    Success,
    /// The step ran and failed.
    Failed,
    /// The step was skipped (its prior success was replayed).
    Skipped,
}

/// Persisted state of one step within a work unit.
///
/// At most one `StepState` exists per (scope key, step name) pair.
/// `saved_data` is only meaningful when `status` is `Success`; it holds
/// side-effect-free results replayed into the context on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepState {
    /// The step name.
    pub step: String,
    /// The step outcome.
    pub status: StepStatus,
    /// Values to replay into the execution context on resume.
    pub saved_data: HashMap<String, String>,
    /// When this state was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl StepState {
    /// Create a step state recorded now.
    #[must_use]
    pub fn new(step: impl Into<String>, status: StepStatus, saved_data: HashMap<String, String>) -> Self {
        Self {
            step: step.into(),
            status,
            saved_data,
            recorded_at: Utc::now(),
        }
    }
}

/// Aggregate state of a work unit: every step it has executed so far.
///
/// Created on the first step, mutated by every step, never deleted except
/// by explicit cleanup. Drives the idempotent-skip decision on re-entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioState {
    /// The work unit this state belongs to.
    pub scope_key: ScopeKey,
    /// Step name to step state.
    pub steps: HashMap<String, StepState>,
    /// Overall status, recomputed on every upsert.
    pub status: StepStatus,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl ScenarioState {
    /// Create an empty aggregate for a work unit.
    #[must_use]
    pub fn new(scope_key: ScopeKey) -> Self {
        Self {
            scope_key,
            steps: HashMap::new(),
            status: StepStatus::Success,
            updated_at: Utc::now(),
        }
    }

    /// Insert or replace a step's state and recompute the overall status.
    pub fn upsert_step(&mut self, state: StepState) {
        self.steps.insert(state.step.clone(), state);
        self.status = self.overall();
        self.updated_at = Utc::now();
    }

    /// Overall status: `Failed` if any step failed, otherwise `Success`.
    #[must_use]
    pub fn overall(&self) -> StepStatus {
        if self
            .steps
            .values()
            .any(|s| s.status == StepStatus::Failed)
        {
            StepStatus::Failed
        } else {
            StepStatus::Success
        }
    }

    /// Look up one step's state.
    #[must_use]
    pub fn step(&self, step: &str) -> Option<&StepState> {
        self.steps.get(step)
    }
}

/// Execution context threaded explicitly through every step call.
///
/// Replaces ambient "current scenario" state: values a step produced on
/// its original run are restored here before downstream steps execute, so
/// a resumed work unit sees the same values as the first run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioContext {
    values: HashMap<String, String>,
}

impl ScenarioContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Read a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Restore every entry of a saved-data map into this context.
    pub fn restore(&mut self, saved: HashMap<String, String>) {
        self.values.extend(saved);
    }

    /// Number of values currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_recomputes_overall() {
        let mut state = ScenarioState::new(ScopeKey::new("run-1"));
        state.upsert_step(StepState::new("a", StepStatus::Success, HashMap::new()));
        assert_eq!(state.status, StepStatus::Success);

        state.upsert_step(StepState::new("b", StepStatus::Failed, HashMap::new()));
        assert_eq!(state.status, StepStatus::Failed);

        // Replacing the failed step flips the aggregate back
        state.upsert_step(StepState::new("b", StepStatus::Success, HashMap::new()));
        assert_eq!(state.status, StepStatus::Success);
    }

    #[test]
    fn one_state_per_step_name() {
        let mut state = ScenarioState::new(ScopeKey::new("run-1"));
        state.upsert_step(StepState::new("a", StepStatus::Failed, HashMap::new()));
        state.upsert_step(StepState::new("a", StepStatus::Success, HashMap::new()));
        assert_eq!(state.steps.len(), 1);
        assert_eq!(state.step("a").map(|s| s.status), Some(StepStatus::Success));
    }

    #[test]
    fn context_restore() {
        let mut ctx = ScenarioContext::new();
        ctx.set("existing", "1");

        let mut saved = HashMap::new();
        saved.insert("x".to_string(), "42".to_string());
        ctx.restore(saved);

        assert_eq!(ctx.get("existing"), Some("1"));
        assert_eq!(ctx.get("x"), Some("42"));
        assert_eq!(ctx.len(), 2);
    }
}
