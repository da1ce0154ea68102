//! Ingestion sink: the inbound notification contract.
//!
//! The broker consumer (or any ingestion adapter) hands records to
//! [`EventSink::receive`], which validates at the mapping boundary, stores
//! durably, and only then notifies the matcher. The ordering matters: a
//! late-registering waiter's fast-path probe must see the record even if it
//! narrowly misses the in-memory notification.

use crate::matcher::EventMatcher;
use std::sync::Arc;
use tether_core::error::{Result, TetherError};
use tether_core::event::EventRecord;
use tether_core::store::EventStore;

/// Receives inbound events: validate, persist, notify.
pub struct EventSink {
    store: Arc<dyn EventStore>,
    matcher: EventMatcher,
}

impl EventSink {
    /// Create a sink over the given store and matcher.
    ///
    /// The store must be the same one the matcher probes, otherwise the
    /// fast path and the notification path disagree.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, matcher: EventMatcher) -> Self {
        Self { store, matcher }
    }

    /// Ingest one event record. Returns the number of waiters resolved.
    ///
    /// Malformed records (missing subject id or event type) are rejected
    /// before any waiter is affected. A persistence failure propagates so
    /// the adapter does not acknowledge its source; the matcher is never
    /// notified for that attempt.
    ///
    /// # Errors
    /// `E201` for malformed records; store errors propagate.
    pub async fn receive(&self, record: EventRecord) -> Result<usize> {
        if record.subject_id.trim().is_empty() {
            tracing::warn!(key = %record.canonical_key, "Dropping event with empty subject id");
            return Err(TetherError::InvalidEvent {
                cause: "missing subject id".to_string(),
            });
        }
        if record.event_type.trim().is_empty() {
            tracing::warn!(key = %record.canonical_key, "Dropping event with empty event type");
            return Err(TetherError::InvalidEvent {
                cause: "missing event type".to_string(),
            });
        }

        // Durable first; notify only after the save succeeded.
        self.store.save(record.clone()).await?;

        let resolved = self.matcher.notify(&record);
        tracing::info!(
            key = %record.canonical_key,
            subject_id = %record.subject_id,
            event_type = %record.event_type,
            waiters_resolved = resolved,
            "Event ingested"
        );
        Ok(resolved)
    }
}
