//! Durable storage ports.
//!
//! The engine treats storage purely as an interface: any backend satisfying
//! these operations is acceptable (document store, relational store, the
//! in-memory implementations in [`memory`]). Backends must provide at least
//! read-your-writes consistency per key; no cross-key transactions are
//! required.

mod memory;

pub use memory::{MemoryEventStore, MemoryStepStore};

use crate::error::Result;
use crate::event::EventRecord;
use crate::key::CanonicalKey;
use crate::step::{ScenarioState, StepStatus};
use crate::types::ScopeKey;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Type alias for async store futures.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Durable, idempotent-by-key storage of event records.
///
/// # Implementation Notes
///
/// - `save` is an upsert keyed on the canonical key
/// - `mark_paused` must never overwrite a non-`None` `first_paused_at`
/// - `find_paused` is the scan source for the resume scheduler
pub trait EventStore: Send + Sync {
    /// Upsert a record by its canonical key.
    fn save(&self, record: EventRecord) -> StoreFuture<'_, ()>;

    /// Look up the record at a canonical key.
    fn find_by_key<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, Option<EventRecord>>;

    /// Find the most recent record (by event timestamp) for a subject and
    /// event type, across all scopes.
    fn find_latest<'a>(
        &'a self,
        subject_id: &'a str,
        event_type: &'a str,
    ) -> StoreFuture<'a, Option<EventRecord>>;

    /// All records for a subject id.
    fn find_by_subject<'a>(&'a self, subject_id: &'a str) -> StoreFuture<'a, Vec<EventRecord>>;

    /// Mark the record at a key as paused and return the updated record.
    ///
    /// Sets `paused`, stamps `first_paused_at` only if unset, refreshes
    /// `last_retry_at`.
    ///
    /// # Errors
    /// `E202` if no record exists at the key.
    fn mark_paused<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, EventRecord>;

    /// Mark the record at a key as resume-ready.
    ///
    /// # Errors
    /// `E202` if no record exists at the key.
    fn mark_resume_ready<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, ()>;

    /// Whether the record at a key is resume-ready (false if absent).
    fn is_resume_ready<'a>(&'a self, key: &'a CanonicalKey) -> StoreFuture<'a, bool>;

    /// All records with `paused == true`.
    fn find_paused(&self) -> StoreFuture<'_, Vec<EventRecord>>;
}

/// Durable per-work-unit, per-step status and saved data.
///
/// Enables the idempotent-skip protocol: a resumed work unit fast-forwards
/// through steps this store reports as already successful.
pub trait StepStateStore: Send + Sync {
    /// Whether the step completed successfully on a prior run.
    fn is_already_successful<'a>(
        &'a self,
        scope: &'a ScopeKey,
        step: &'a str,
    ) -> StoreFuture<'a, bool>;

    /// The saved data recorded with the step's prior success.
    ///
    /// Empty if the step has no state or did not succeed.
    fn saved_data<'a>(
        &'a self,
        scope: &'a ScopeKey,
        step: &'a str,
    ) -> StoreFuture<'a, HashMap<String, String>>;

    /// Record a step outcome, replacing any prior state for the same
    /// (scope, step) pair.
    fn mark_step<'a>(
        &'a self,
        scope: &'a ScopeKey,
        step: &'a str,
        status: StepStatus,
        data: HashMap<String, String>,
    ) -> StoreFuture<'a, ()>;

    /// The full aggregate for a work unit, if it has executed any step.
    fn scenario<'a>(&'a self, scope: &'a ScopeKey) -> StoreFuture<'a, Option<ScenarioState>>;

    /// Explicit cleanup: drop a work unit's aggregate entirely.
    fn remove<'a>(&'a self, scope: &'a ScopeKey) -> StoreFuture<'a, ()>;
}
