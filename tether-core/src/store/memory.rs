//! In-memory store implementations for testing and single-node use.

use super::{EventStore, StepStateStore, StoreFuture};
use crate::error::TetherError;
use crate::event::EventRecord;
use crate::key::CanonicalKey;
use crate::step::{ScenarioState, StepState, StepStatus};
use crate::types::ScopeKey;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory event store. All state is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    records: RwLock<HashMap<CanonicalKey, EventRecord>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EventStore for MemoryEventStore {
    fn save(&self, record: EventRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let key = record.canonical_key.clone();
            let replaced = self.records.write().insert(key.clone(), record).is_some();
            tracing::debug!(key = %key, replaced, "Event record saved");
            Ok(())
        })
    }

    fn find_by_key<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, Option<EventRecord>> {
        Box::pin(async move { Ok(self.records.read().get(key).cloned()) })
    }

    fn find_latest<'a>(
        &'a self,
        subject_id: &'a str,
        event_type: &'a str,
    ) -> StoreFuture<'a, Option<EventRecord>> {
        Box::pin(async move {
            Ok(self
                .records
                .read()
                .values()
                .filter(|r| r.subject_id == subject_id && r.event_type == event_type)
                .max_by_key(|r| r.event_timestamp)
                .cloned())
        })
    }

    fn find_by_subject<'a>(&'a self, subject_id: &'a str) -> StoreFuture<'a, Vec<EventRecord>> {
        Box::pin(async move {
            Ok(self
                .records
                .read()
                .values()
                .filter(|r| r.subject_id == subject_id)
                .cloned()
                .collect())
        })
    }

    fn mark_paused<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, EventRecord> {
        Box::pin(async move {
            let mut records = self.records.write();
            let record = records.get_mut(key).ok_or_else(|| TetherError::EventNotFound {
                key: key.as_str().to_string(),
            })?;
            record.record_pause(Utc::now());
            tracing::info!(key = %key, "Event record marked paused");
            Ok(record.clone())
        })
    }

    fn mark_resume_ready<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut records = self.records.write();
            let record = records.get_mut(key).ok_or_else(|| TetherError::EventNotFound {
                key: key.as_str().to_string(),
            })?;
            record.resume_ready = true;
            tracing::info!(key = %key, "Event record marked resume-ready");
            Ok(())
        })
    }

    fn is_resume_ready<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            Ok(self
                .records
                .read()
                .get(key)
                .map(|r| r.resume_ready)
                .unwrap_or(false))
        })
    }

    fn find_paused(&self) -> StoreFuture<'_, Vec<EventRecord>> {
        Box::pin(async move {
            Ok(self
                .records
                .read()
                .values()
                .filter(|r| r.paused)
                .cloned()
                .collect())
        })
    }
}

/// In-memory step state store. All state is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStepStore {
    scenarios: RwLock<HashMap<ScopeKey, ScenarioState>>,
}

impl MemoryStepStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of work units tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.read().len()
    }

    /// Whether no work units are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.read().is_empty()
    }
}

impl StepStateStore for MemoryStepStore {
    fn is_already_successful<'a>(
        &'a self,
        scope: &'a ScopeKey,
        step: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            Ok(self
                .scenarios
                .read()
                .get(scope)
                .and_then(|s| s.step(step))
                .map(|s| s.status == StepStatus::Success)
                .unwrap_or(false))
        })
    }

    fn saved_data<'a>(
        &'a self,
        scope: &'a ScopeKey,
        step: &'a str,
    ) -> StoreFuture<'a, HashMap<String, String>> {
        Box::pin(async move {
            Ok(self
                .scenarios
                .read()
                .get(scope)
                .and_then(|s| s.step(step))
                .filter(|s| s.status == StepStatus::Success)
                .map(|s| s.saved_data.clone())
                .unwrap_or_default())
        })
    }

    fn mark_step<'a>(
        &'a self,
        scope: &'a ScopeKey,
        step: &'a str,
        status: StepStatus,
        data: HashMap<String, String>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut scenarios = self.scenarios.write();
            let scenario = scenarios
                .entry(scope.clone())
                .or_insert_with(|| ScenarioState::new(scope.clone()));
            scenario.upsert_step(StepState::new(step, status, data));
            tracing::debug!(scope = %scope, step, status = ?status, "Step state recorded");
            Ok(())
        })
    }

    fn scenario<'a>(&'a self, scope: &'a ScopeKey) -> StoreFuture<'a, Option<ScenarioState>> {
        Box::pin(async move { Ok(self.scenarios.read().get(scope).cloned()) })
    }

    fn remove<'a>(&'a self, scope: &'a ScopeKey) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.scenarios.write().remove(scope);
            tracing::debug!(scope = %scope, "Scenario state removed");
            Ok(())
        })
    }
}
