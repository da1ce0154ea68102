//! Resume scheduler: periodic sweep over paused, resume-ready records.
//!
//! A background task polls the event store on a fixed delay, batches the
//! eligible records, and drives the [`ResumeExecutor`] per batch. Failed
//! sweeps increment retry counters; records that exhaust their budget are
//! abandoned (surfaced via status and log only). A manual [`sweep`] entry
//! point forces an immediate pass outside the timer cadence.
//!
//! [`sweep`]: ResumeScheduler::sweep

use crate::executor::ResumeExecutor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tether_core::config::EngineConfig;
use tether_core::error::Result;
use tether_core::event::{EventRecord, STATUS_RETRY_EXHAUSTED};
use tether_core::store::EventStore;
use tether_core::types::{ScopeKey, SweepId};

/// Totals from one sweep, for logs and the manual-trigger caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Identifier of this sweep.
    pub sweep_id: SweepId,
    /// Paused, resume-ready records considered (within retry budget).
    pub candidates: usize,
    /// Number of batches driven through the executor.
    pub batches: usize,
    /// Records marked resumed.
    pub resumed: usize,
    /// Records whose retry count was incremented.
    pub failed: usize,
    /// Resume-ready records excluded because their budget is exhausted.
    pub exhausted: usize,
}

/// Periodic driver of paused work.
pub struct ResumeScheduler {
    store: Arc<dyn EventStore>,
    executor: Arc<ResumeExecutor>,
    config: EngineConfig,
    running: Arc<AtomicBool>,
}

impl ResumeScheduler {
    /// Create a scheduler over a store and executor.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, executor: Arc<ResumeExecutor>, config: EngineConfig) -> Self {
        Self {
            store,
            executor,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the background loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the sweep loop until [`ResumeScheduler::stop`] is called.
    ///
    /// Sweep errors are logged, never fatal: every failure path in this
    /// subsystem degrades to retry or logged drop.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Resume scheduler started"
        );

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "Sweep failed");
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        tracing::info!("Resume scheduler stopped");
    }

    /// Stop the background loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One sweep: scan, filter, batch, execute, account.
    ///
    /// This is also the manual trigger for forcing an immediate pass (e.g.
    /// in response to a known burst of arrivals).
    ///
    /// # Errors
    /// Store scan/save failures propagate; executor failures do not (they
    /// feed the retry accounting instead).
    pub async fn sweep(&self) -> Result<SweepReport> {
        let sweep_id = SweepId::new();
        let paused = self.store.find_paused().await?;

        let exhausted = paused
            .iter()
            .filter(|r| r.resume_ready && r.is_retry_exhausted(self.config.max_retries))
            .count();
        let eligible: Vec<EventRecord> = paused
            .into_iter()
            .filter(|r| r.resume_ready && !r.is_retry_exhausted(self.config.max_retries))
            .collect();

        if exhausted > 0 {
            tracing::warn!(
                sweep_id = %sweep_id,
                exhausted,
                "Resume-ready records abandoned after exhausting retries"
            );
        }
        if eligible.is_empty() {
            return Ok(SweepReport {
                sweep_id,
                candidates: 0,
                batches: 0,
                resumed: 0,
                failed: 0,
                exhausted,
            });
        }

        let candidates = eligible.len();
        let mut batches = 0;
        let mut resumed = 0;
        let mut failed = 0;

        for batch in eligible.chunks(self.config.batch_size.max(1)) {
            batches += 1;
            let scope_keys = distinct_scope_keys(batch);
            tracing::debug!(
                sweep_id = %sweep_id,
                batch = batches,
                records = batch.len(),
                scope_keys = scope_keys.len(),
                "Executing resume batch"
            );

            let result = self.executor.execute(&scope_keys).await;
            if result.is_sweep_success() {
                self.apply_success(batch).await?;
                resumed += batch.len();
            } else {
                self.apply_failure(batch).await?;
                failed += batch.len();
            }
        }

        tracing::info!(
            sweep_id = %sweep_id,
            candidates,
            batches,
            resumed,
            failed,
            exhausted,
            "Sweep complete"
        );
        Ok(SweepReport {
            sweep_id,
            candidates,
            batches,
            resumed,
            failed,
            exhausted,
        })
    }

    async fn apply_success(&self, batch: &[EventRecord]) -> Result<()> {
        let now = Utc::now();
        for record in batch {
            let mut record = record.clone();
            record.record_resumed(now);
            self.store.save(record).await?;
        }
        Ok(())
    }

    /// Batch-level retry accounting: the executor collapses a batch into a
    /// single outcome, so every record in a failed batch is charged one
    /// attempt.
    async fn apply_failure(&self, batch: &[EventRecord]) -> Result<()> {
        let now = Utc::now();
        for record in batch {
            let mut record = record.clone();
            record.record_retry_failure(now);
            if record.is_retry_exhausted(self.config.max_retries) {
                record.status = STATUS_RETRY_EXHAUSTED.to_string();
                tracing::warn!(
                    key = %record.canonical_key,
                    retry_count = record.retry_count,
                    "Record exhausted its retry budget"
                );
            }
            self.store.save(record).await?;
        }
        Ok(())
    }
}

/// Distinct scope keys represented in a batch, preserving first-seen order.
///
/// The scope component of the canonical key identifies the work unit; for
/// legacy records without a scope the subject id is the best identity
/// available.
fn distinct_scope_keys(batch: &[EventRecord]) -> Vec<ScopeKey> {
    let mut seen = std::collections::HashSet::new();
    let mut keys = Vec::new();
    for record in batch {
        let scope = record
            .canonical_key
            .parse()
            .ok()
            .and_then(|parsed| parsed.scope)
            .unwrap_or_else(|| record.subject_id.clone());
        let key = ScopeKey::new(scope);
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRunner, RunnerBehavior};
    use tether_core::key::CanonicalKey;
    use tether_core::store::MemoryEventStore;

    async fn seed_resume_ready(store: &MemoryEventStore, scope: &str, subject: &str) -> CanonicalKey {
        let record = EventRecord::scoped(scope, subject, "done", "{}").unwrap();
        let key = record.canonical_key.clone();
        store.save(record).await.unwrap();
        store.mark_paused(&key).await.unwrap();
        store.mark_resume_ready(&key).await.unwrap();
        key
    }

    fn scheduler(
        store: Arc<MemoryEventStore>,
        behavior: RunnerBehavior,
        config: EngineConfig,
    ) -> (ResumeScheduler, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::new(behavior));
        let executor = Arc::new(ResumeExecutor::new(runner.clone()));
        (ResumeScheduler::new(store, executor, config), runner)
    }

    #[tokio::test]
    async fn empty_store_sweeps_cleanly() {
        let store = Arc::new(MemoryEventStore::new());
        let (scheduler, runner) =
            scheduler(store, RunnerBehavior::PassAll, EngineConfig::default());

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.candidates, 0);
        assert_eq!(report.batches, 0);
        assert!(runner.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn paused_but_not_ready_is_ignored() {
        let store = Arc::new(MemoryEventStore::new());
        let record = EventRecord::scoped("run-1", "order-1", "done", "{}").unwrap();
        let key = record.canonical_key.clone();
        store.save(record).await.unwrap();
        store.mark_paused(&key).await.unwrap();

        let (scheduler, runner) =
            scheduler(store, RunnerBehavior::PassAll, EngineConfig::default());
        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.candidates, 0);
        assert!(runner.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn batch_partitioning_twelve_records_batch_five() {
        let store = Arc::new(MemoryEventStore::new());
        for i in 0..12 {
            seed_resume_ready(&store, &format!("run-{i}"), &format!("order-{i}")).await;
        }

        let config = EngineConfig::default().with_batch_size(5);
        let (scheduler, runner) = scheduler(store, RunnerBehavior::PassAll, config);

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.candidates, 12);
        assert_eq!(report.batches, 3);
        assert_eq!(report.resumed, 12);

        let calls = runner.calls.lock();
        let mut sizes: Vec<usize> = calls.iter().map(|c| c.targets.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 5, 5]);
    }

    #[tokio::test]
    async fn success_marks_records_resumed() {
        let store = Arc::new(MemoryEventStore::new());
        let key = seed_resume_ready(&store, "run-1", "order-1").await;

        let (scheduler, _runner) =
            scheduler(store.clone(), RunnerBehavior::PassAll, EngineConfig::default());
        scheduler.sweep().await.unwrap();

        let record = store.find_by_key(&key).await.unwrap().unwrap();
        assert!(!record.resume_ready);
        assert_eq!(record.status, tether_core::event::STATUS_RESUMED);
        assert!(record.last_retry_at.is_some());
    }

    #[tokio::test]
    async fn partial_outcome_still_marks_resumed() {
        let store = Arc::new(MemoryEventStore::new());
        let key = seed_resume_ready(&store, "run-1", "order-1").await;

        let (scheduler, _runner) = scheduler(
            store.clone(),
            RunnerBehavior::FailUnit(ScopeKey::new("run-1")),
            EngineConfig::default(),
        );
        let report = scheduler.sweep().await.unwrap();

        // Partial is reported, not retried.
        assert_eq!(report.resumed, 1);
        let record = store.find_by_key(&key).await.unwrap().unwrap();
        assert!(!record.resume_ready);
    }

    #[tokio::test]
    async fn runner_error_increments_whole_batch() {
        let store = Arc::new(MemoryEventStore::new());
        let k1 = seed_resume_ready(&store, "run-1", "order-1").await;
        let k2 = seed_resume_ready(&store, "run-2", "order-2").await;

        let (scheduler, _runner) =
            scheduler(store.clone(), RunnerBehavior::Error, EngineConfig::default());
        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.failed, 2);

        for key in [&k1, &k2] {
            let record = store.find_by_key(key).await.unwrap().unwrap();
            assert_eq!(record.retry_count, 1);
            assert!(record.resume_ready, "failed records stay resume-ready");
        }
    }

    #[tokio::test]
    async fn retry_bound_excludes_exhausted_records() {
        let store = Arc::new(MemoryEventStore::new());
        seed_resume_ready(&store, "run-1", "order-1").await;

        let config = EngineConfig::default().with_max_retries(2);
        let (scheduler, runner) = scheduler(store.clone(), RunnerBehavior::Error, config);

        // Two failing sweeps exhaust the budget.
        assert_eq!(scheduler.sweep().await.unwrap().failed, 1);
        assert_eq!(scheduler.sweep().await.unwrap().failed, 1);

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.candidates, 0);
        assert_eq!(report.exhausted, 1);
        assert_eq!(runner.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_record_gets_status_label() {
        let store = Arc::new(MemoryEventStore::new());
        let key = seed_resume_ready(&store, "run-1", "order-1").await;

        let config = EngineConfig::default().with_max_retries(1);
        let (scheduler, _runner) = scheduler(store.clone(), RunnerBehavior::Error, config);
        scheduler.sweep().await.unwrap();

        let record = store.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!(record.status, STATUS_RETRY_EXHAUSTED);
    }

    #[tokio::test]
    async fn distinct_scope_keys_dedupes_within_batch() {
        let a1 = EventRecord::scoped("run-1", "order-1", "shipped", "{}").unwrap();
        let a2 = EventRecord::scoped("run-1", "order-2", "billed", "{}").unwrap();
        let b = EventRecord::scoped("run-2", "order-3", "shipped", "{}").unwrap();

        let keys = distinct_scope_keys(&[a1, a2, b]);
        assert_eq!(keys, vec![ScopeKey::new("run-1"), ScopeKey::new("run-2")]);
    }

    #[tokio::test]
    async fn legacy_record_falls_back_to_subject_id() {
        let legacy = EventRecord::new(
            CanonicalKey::legacy("order-9", "shipped").unwrap(),
            "order-9",
            "shipped",
            "{}",
        );
        let keys = distinct_scope_keys(&[legacy]);
        assert_eq!(keys, vec![ScopeKey::new("order-9")]);
    }

    #[tokio::test]
    async fn stop_halts_background_loop() {
        let store = Arc::new(MemoryEventStore::new());
        let config = EngineConfig::default().with_poll_interval_ms(10);
        let (scheduler, _runner) = scheduler(store, RunnerBehavior::PassAll, config);
        let scheduler = Arc::new(scheduler);

        let background = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(scheduler.is_running());
        scheduler.stop();

        tokio::time::timeout(std::time::Duration::from_secs(1), background)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!(!scheduler.is_running());
    }
}
