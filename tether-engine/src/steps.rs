//! Idempotent step gate.
//!
//! Every re-entrant step of a work unit consults the gate before running.
//! If the step already succeeded on a prior run, its saved data is restored
//! into the caller's [`ScenarioContext`] and the step is skipped — this is
//! what lets a resumed work unit fast-forward through completed steps
//! instead of repeating external side effects.

use std::collections::HashMap;
use std::sync::Arc;
use tether_core::error::Result;
use tether_core::step::{ScenarioContext, StepStatus};
use tether_core::store::StepStateStore;
use tether_core::types::ScopeKey;

/// Decision for one step entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDisposition {
    /// The step already succeeded; its saved data was restored into the
    /// context. Do not re-execute side effects.
    Skip {
        /// The data replayed into the context.
        saved_data: HashMap<String, String>,
    },
    /// The step has not succeeded yet; execute normally and record the
    /// outcome via [`StepGate::complete`] or [`StepGate::fail`].
    Run,
}

impl StepDisposition {
    /// Whether the step should be skipped.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }
}

/// Gate consulted on every step entry of a (possibly re-executed) work unit.
pub struct StepGate {
    store: Arc<dyn StepStateStore>,
}

impl StepGate {
    /// Create a gate over a step state store.
    #[must_use]
    pub fn new(store: Arc<dyn StepStateStore>) -> Self {
        Self { store }
    }

    /// Decide whether a step runs or is skipped.
    ///
    /// On skip, every saved-data entry is restored into `ctx` so downstream
    /// steps see the same values as the original run.
    ///
    /// # Errors
    /// Store failures propagate.
    pub async fn enter(
        &self,
        scope: &ScopeKey,
        step: &str,
        ctx: &mut ScenarioContext,
    ) -> Result<StepDisposition> {
        if self.store.is_already_successful(scope, step).await? {
            let saved_data = self.store.saved_data(scope, step).await?;
            ctx.restore(saved_data.clone());
            tracing::info!(scope = %scope, step, restored = saved_data.len(), "Step already successful, skipping");
            return Ok(StepDisposition::Skip { saved_data });
        }
        Ok(StepDisposition::Run)
    }

    /// Record a successful step run with the data needed to replay it.
    ///
    /// # Errors
    /// Store failures propagate.
    pub async fn complete(
        &self,
        scope: &ScopeKey,
        step: &str,
        data: HashMap<String, String>,
    ) -> Result<()> {
        self.store
            .mark_step(scope, step, StepStatus::Success, data)
            .await
    }

    /// Record a failed step run.
    ///
    /// # Errors
    /// Store failures propagate.
    pub async fn fail(&self, scope: &ScopeKey, step: &str) -> Result<()> {
        self.store
            .mark_step(scope, step, StepStatus::Failed, HashMap::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::store::MemoryStepStore;

    fn gate() -> (StepGate, Arc<MemoryStepStore>) {
        let store = Arc::new(MemoryStepStore::new());
        (StepGate::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_entry_runs() {
        let (gate, _store) = gate();
        let scope = ScopeKey::new("run-1");
        let mut ctx = ScenarioContext::new();

        let disposition = gate.enter(&scope, "stepA", &mut ctx).await.unwrap();
        assert_eq!(disposition, StepDisposition::Run);
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn re_entry_skips_and_restores() {
        let (gate, _store) = gate();
        let scope = ScopeKey::new("run-1");

        let mut data = HashMap::new();
        data.insert("x".to_string(), "1".to_string());
        gate.complete(&scope, "stepA", data.clone()).await.unwrap();

        // Fresh execution of the same work unit
        let mut ctx = ScenarioContext::new();
        let disposition = gate.enter(&scope, "stepA", &mut ctx).await.unwrap();

        assert!(disposition.is_skip());
        assert_eq!(ctx.get("x"), Some("1"));
    }

    #[tokio::test]
    async fn failed_step_runs_again() {
        let (gate, _store) = gate();
        let scope = ScopeKey::new("run-1");

        gate.fail(&scope, "stepA").await.unwrap();

        let mut ctx = ScenarioContext::new();
        let disposition = gate.enter(&scope, "stepA", &mut ctx).await.unwrap();
        assert_eq!(disposition, StepDisposition::Run);
    }

    #[tokio::test]
    async fn steps_are_independent() {
        let (gate, _store) = gate();
        let scope = ScopeKey::new("run-1");

        gate.complete(&scope, "stepA", HashMap::new()).await.unwrap();

        let mut ctx = ScenarioContext::new();
        assert!(gate.enter(&scope, "stepA", &mut ctx).await.unwrap().is_skip());
        assert_eq!(
            gate.enter(&scope, "stepB", &mut ctx).await.unwrap(),
            StepDisposition::Run
        );
    }
}
