//! In-memory, non-blocking event correlation.
//!
//! The matcher correlates a subject + event-type interest to a delivered
//! [`EventRecord`] without blocking the caller. Registration returns either
//! an already-resolved result (fast path: the record is already in the
//! store) or a pending [`WaitHandle`]; the ingestion path resolves pending
//! handles via [`EventMatcher::notify`], and a per-waiter TTL task resolves
//! anything left behind so the registry cannot grow without bound.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tether_core::error::{Result, TetherError};
use tether_core::event::EventRecord;
use tether_core::key::CanonicalKey;
use tether_core::store::EventStore;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Result of registering interest in an event.
#[derive(Debug)]
pub enum Registration {
    /// The event was already in the store; no waiter was created.
    Ready(EventRecord),
    /// The event has not been observed yet; await or poll the handle.
    Pending(WaitHandle),
}

impl Registration {
    /// Whether this registration resolved on the fast path.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// How a pending wait concluded.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The awaited event was delivered.
    Delivered(EventRecord),
    /// The TTL elapsed before the event was observed.
    ///
    /// Not an error: this is the designed "not yet" signal. Callers treat
    /// it as a pause/retry-later condition.
    TimedOut,
}

impl WaitOutcome {
    /// Whether the event was delivered.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// A pending registration: resolves exactly once, by delivery or TTL.
pub struct WaitHandle {
    key: CanonicalKey,
    rx: oneshot::Receiver<WaitOutcome>,
}

impl std::fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitHandle").field("key", &self.key).finish()
    }
}

impl WaitHandle {
    /// The canonical key this handle is registered under.
    #[must_use]
    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    /// Await resolution.
    ///
    /// # Errors
    /// `E401` if the matcher was dropped with this handle still pending.
    pub async fn wait(self) -> Result<WaitOutcome> {
        self.rx.await.map_err(|_| TetherError::WaitChannelClosed {
            key: self.key.as_str().to_string(),
        })
    }

    /// Poll without blocking; `None` while still pending.
    ///
    /// # Errors
    /// `E401` if the matcher was dropped with this handle still pending.
    pub fn try_outcome(&mut self) -> Result<Option<WaitOutcome>> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(TetherError::WaitChannelClosed {
                key: self.key.as_str().to_string(),
            }),
        }
    }
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<WaitOutcome>,
    registered_at: DateTime<Utc>,
    timeout: Option<AbortHandle>,
}

struct MatcherInner {
    store: Arc<dyn EventStore>,
    waiters: Mutex<HashMap<CanonicalKey, Vec<Waiter>>>,
    ttl: Duration,
    next_id: AtomicU64,
}

/// The waiter registry: the one piece of mutable shared state in the engine.
///
/// Registration and notification race freely; the registry guarantees no
/// handle is resolved twice and no handle is lost. Waiters are process-local
/// and lost on restart — restart-survivable waits come from resuming the
/// original caller, not from restoring in-memory waiters.
#[derive(Clone)]
pub struct EventMatcher {
    inner: Arc<MatcherInner>,
}

impl EventMatcher {
    /// Create a matcher over an event store, with the given waiter TTL.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(MatcherInner {
                store,
                waiters: Mutex::new(HashMap::new()),
                ttl,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register interest in an event.
    ///
    /// Builds the scope-qualified key (falling back to the legacy key when
    /// no scope is available), probes the store at that key — and, for
    /// migration compatibility, at the derived legacy key — and returns an
    /// already-resolved [`Registration::Ready`] on a hit. Otherwise parks a
    /// pending handle with a TTL timeout task, then probes the store once
    /// more so a record persisted during the insertion does not strand the
    /// waiter until the TTL. Never blocks.
    ///
    /// # Errors
    /// Key-construction errors (`E102`) and store probe failures propagate.
    pub async fn register(
        &self,
        scope: Option<&str>,
        subject_id: &str,
        event_type: &str,
    ) -> Result<Registration> {
        let key = match scope {
            Some(scope) => CanonicalKey::scoped(scope, subject_id, event_type)?,
            None => {
                // Deprecated path: legacy keys can cross-correlate unrelated
                // work units sharing a subject id.
                tracing::warn!(
                    subject_id,
                    event_type,
                    "Registering with legacy key; no scope available"
                );
                CanonicalKey::legacy(subject_id, event_type)?
            }
        };

        // Fast path: the event may already be durably stored.
        if let Some(record) = self.inner.store.find_by_key(&key).await? {
            tracing::debug!(key = %key, "Registration satisfied from store");
            return Ok(Registration::Ready(record));
        }
        if let Some(legacy) = key.legacy_equivalent() {
            if let Some(record) = self.inner.store.find_by_key(&legacy).await? {
                tracing::debug!(key = %key, legacy = %legacy, "Registration satisfied from legacy record");
                return Ok(Registration::Ready(record));
            }
        }

        let (tx, rx) = oneshot::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut waiters = self.inner.waiters.lock();
            waiters.entry(key.clone()).or_default().push(Waiter {
                id,
                tx,
                registered_at: Utc::now(),
                timeout: None,
            });
        }

        // Spawn the TTL task, then attach its abort handle so delivery can
        // cancel the timer. If the waiter resolved in between, cancel now.
        let task = tokio::spawn(expire_waiter(
            Arc::clone(&self.inner),
            key.clone(),
            id,
            self.inner.ttl,
        ));
        {
            let mut waiters = self.inner.waiters.lock();
            let slot = waiters
                .get_mut(&key)
                .and_then(|list| list.iter_mut().find(|w| w.id == id));
            match slot {
                Some(waiter) => waiter.timeout = Some(task.abort_handle()),
                None => task.abort(),
            }
        }

        // Second probe: a record stored between the miss above and the
        // insertion would otherwise leave this waiter pending for the full
        // TTL. Now that the waiter is visible to notify, a hit here means
        // either we remove it ourselves, or notify already resolved it.
        let mut stored = self.inner.store.find_by_key(&key).await?;
        if stored.is_none() {
            if let Some(legacy) = key.legacy_equivalent() {
                stored = self.inner.store.find_by_key(&legacy).await?;
            }
        }
        if let Some(record) = stored {
            if self.remove_waiter(&key, id) {
                tracing::debug!(key = %key, "Registration satisfied by concurrently stored record");
                return Ok(Registration::Ready(record));
            }
            // notify won the race; the handle already holds the delivery.
        }

        tracing::debug!(key = %key, waiter_id = id, "Waiter registered");
        Ok(Registration::Pending(WaitHandle { key, rx }))
    }

    /// Remove one waiter by id, cancelling its timeout task. Returns false
    /// if the waiter was already drained.
    fn remove_waiter(&self, key: &CanonicalKey, id: u64) -> bool {
        let waiter = {
            let mut waiters = self.inner.waiters.lock();
            let Some(list) = waiters.get_mut(key) else {
                return false;
            };
            let Some(pos) = list.iter().position(|w| w.id == id) else {
                return false;
            };
            let waiter = list.remove(pos);
            if list.is_empty() {
                waiters.remove(key);
            }
            waiter
        };
        if let Some(timeout) = waiter.timeout {
            timeout.abort();
        }
        true
    }

    /// Deliver a record to every waiter registered for its canonical key.
    ///
    /// Must be called only after the record has been durably persisted, so
    /// a late registration's fast-path probe still sees it. If the key is
    /// scope-qualified, waiters under the derived legacy key are resolved
    /// too (migration bridge). Returns the number of handles resolved; an
    /// absent key is a no-op.
    pub fn notify(&self, record: &EventRecord) -> usize {
        let mut resolved = self.resolve_key(&record.canonical_key, record);
        if let Some(legacy) = record.canonical_key.legacy_equivalent() {
            resolved += self.resolve_key(&legacy, record);
        }
        resolved
    }

    fn resolve_key(&self, key: &CanonicalKey, record: &EventRecord) -> usize {
        let drained = self.inner.waiters.lock().remove(key).unwrap_or_default();
        let count = drained.len();
        for waiter in drained {
            if let Some(timeout) = waiter.timeout {
                timeout.abort();
            }
            let waited_for = Utc::now() - waiter.registered_at;
            if waiter
                .tx
                .send(WaitOutcome::Delivered(record.clone()))
                .is_err()
            {
                tracing::debug!(key = %key, waiter_id = waiter.id, "Waiter handle dropped before delivery");
            } else {
                tracing::debug!(
                    key = %key,
                    waiter_id = waiter.id,
                    waited_ms = waited_for.num_milliseconds(),
                    "Waiter resolved"
                );
            }
        }
        if count > 0 {
            tracing::info!(key = %key, waiters = count, "Event delivered to waiters");
        }
        count
    }

    /// Total pending waiters across all keys.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.waiters.lock().values().map(Vec::len).sum()
    }

    /// Whether any waiter is pending for a key.
    #[must_use]
    pub fn has_waiters(&self, key: &CanonicalKey) -> bool {
        self.inner
            .waiters
            .lock()
            .get(key)
            .is_some_and(|list| !list.is_empty())
    }
}

/// TTL task: after the TTL elapses, remove the waiter (if still pending)
/// and resolve it with [`WaitOutcome::TimedOut`].
async fn expire_waiter(inner: Arc<MatcherInner>, key: CanonicalKey, id: u64, ttl: Duration) {
    tokio::time::sleep(ttl).await;

    let waiter = {
        let mut waiters = inner.waiters.lock();
        let Some(list) = waiters.get_mut(&key) else {
            return;
        };
        let Some(pos) = list.iter().position(|w| w.id == id) else {
            return;
        };
        let waiter = list.remove(pos);
        if list.is_empty() {
            waiters.remove(&key);
        }
        waiter
    };

    tracing::info!(key = %key, waiter_id = id, ttl_ms = ttl.as_millis() as u64, "Waiter timed out");
    let _ = waiter.tx.send(WaitOutcome::TimedOut);
}
