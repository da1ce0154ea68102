//! Persisted event records.

use crate::error::Result;
use crate::key::CanonicalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status written when a paused record has been re-driven.
pub const STATUS_RESUMED: &str = "RESUMED";

/// Status written when a record has exhausted its retry budget.
pub const STATUS_RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";

/// A durably stored external event, keyed by its canonical key.
///
/// Writes are upserts on `canonical_key`; at most one record exists per key.
/// The pause/resume flags and retry counters drive the scheduler's sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique correlation key (primary identity).
    pub canonical_key: CanonicalKey,
    /// The business subject id.
    pub subject_id: String,
    /// The event type.
    pub event_type: String,
    /// When the event occurred at its source.
    pub event_timestamp: DateTime<Utc>,
    /// Opaque payload, typically JSON.
    pub payload: String,
    /// Whether a work unit is paused on this record.
    pub paused: bool,
    /// Whether the paused work unit is eligible for re-execution.
    pub resume_ready: bool,
    /// Number of failed resume attempts.
    pub retry_count: u32,
    /// When the record was first paused. Set once, never overwritten.
    pub first_paused_at: Option<DateTime<Utc>>,
    /// When the last resume attempt (success or failure) was made.
    pub last_retry_at: Option<DateTime<Utc>>,
    /// Free-form status label.
    pub status: String,
    /// When this record was observed by the ingestion path.
    pub observed_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create a new record with the given key and payload.
    ///
    /// `event_timestamp` and `observed_at` default to now; override the
    /// former with [`EventRecord::with_event_timestamp`] when the source
    /// supplies its own clock.
    #[must_use]
    pub fn new(
        canonical_key: CanonicalKey,
        subject_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            canonical_key,
            subject_id: subject_id.into(),
            event_type: event_type.into(),
            event_timestamp: now,
            payload: payload.into(),
            paused: false,
            resume_ready: false,
            retry_count: 0,
            first_paused_at: None,
            last_retry_at: None,
            status: String::new(),
            observed_at: now,
        }
    }

    /// Create a scope-qualified record, building the canonical key.
    ///
    /// # Errors
    /// Returns `E102` if a key component is invalid.
    pub fn scoped(
        scope: &str,
        subject_id: &str,
        event_type: &str,
        payload: impl Into<String>,
    ) -> Result<Self> {
        let key = CanonicalKey::scoped(scope, subject_id, event_type)?;
        Ok(Self::new(key, subject_id, event_type, payload))
    }

    /// Set the source event timestamp.
    #[must_use]
    pub fn with_event_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.event_timestamp = at;
        self
    }

    /// Set the status label.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Mark this record paused.
    ///
    /// `first_paused_at` is set only if not already set; `last_retry_at`
    /// is refreshed.
    pub fn record_pause(&mut self, now: DateTime<Utc>) {
        self.paused = true;
        self.first_paused_at.get_or_insert(now);
        self.last_retry_at = Some(now);
    }

    /// Mark a successful resume: clears `resume_ready`, stamps the status,
    /// refreshes `last_retry_at`.
    pub fn record_resumed(&mut self, now: DateTime<Utc>) {
        self.resume_ready = false;
        self.status = STATUS_RESUMED.to_string();
        self.last_retry_at = Some(now);
    }

    /// Mark a failed resume attempt: bumps `retry_count`, refreshes
    /// `last_retry_at`.
    pub fn record_retry_failure(&mut self, now: DateTime<Utc>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_retry_at = Some(now);
    }

    /// Whether this record has used up its retry budget.
    #[must_use]
    pub fn is_retry_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EventRecord {
        EventRecord::scoped("run-1", "order-9", "shipped", "{}").unwrap()
    }

    #[test]
    fn new_record_defaults() {
        let rec = record();
        assert!(!rec.paused);
        assert!(!rec.resume_ready);
        assert_eq!(rec.retry_count, 0);
        assert_eq!(rec.first_paused_at, None);
        assert_eq!(rec.canonical_key.as_str(), "run-1::order-9::shipped");
    }

    #[test]
    fn first_paused_at_is_set_once() {
        let mut rec = record();
        let t1 = Utc::now();
        rec.record_pause(t1);
        assert_eq!(rec.first_paused_at, Some(t1));

        let t2 = t1 + chrono::Duration::seconds(60);
        rec.record_pause(t2);
        assert_eq!(rec.first_paused_at, Some(t1));
        assert_eq!(rec.last_retry_at, Some(t2));
    }

    #[test]
    fn resumed_clears_flag_and_stamps_status() {
        let mut rec = record();
        rec.record_pause(Utc::now());
        rec.resume_ready = true;

        rec.record_resumed(Utc::now());
        assert!(!rec.resume_ready);
        assert_eq!(rec.status, STATUS_RESUMED);
    }

    #[test]
    fn retry_accounting() {
        let mut rec = record();
        rec.record_retry_failure(Utc::now());
        rec.record_retry_failure(Utc::now());
        assert_eq!(rec.retry_count, 2);
        assert!(!rec.is_retry_exhausted(3));
        assert!(rec.is_retry_exhausted(2));
    }
}
