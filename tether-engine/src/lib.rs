//! Tether engine.
//!
//! The runtime half of tether: correlates external events to suspended
//! units of work and re-drives paused work in bounded batches.
//!
//! # Key Components
//!
//! - **Matcher**: the in-memory waiter registry — register interest,
//!   resolve waiters on delivery, expire stale waiters by TTL
//! - **Ingest**: the inbound contract — validate, persist durably, then
//!   notify
//! - **Steps**: the idempotent gate that lets resumed work fast-forward
//!   through already-successful steps
//! - **Scheduler**: the periodic sweep over paused, resume-ready records
//! - **Executor**: bounded run requests against the external runner, with
//!   outcomes as values rather than exceptions
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tether_core::store::MemoryEventStore;
//! use tether_core::EventRecord;
//! use tether_engine::{EventMatcher, EventSink, Registration};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tether_core::Result<()> {
//! let store: Arc<MemoryEventStore> = Arc::new(MemoryEventStore::new());
//! let matcher = EventMatcher::new(store.clone(), Duration::from_secs(3600));
//! let sink = EventSink::new(store, matcher.clone());
//!
//! // A work unit declares interest and parks a handle.
//! let registration = matcher.register(Some("run-1"), "order-42", "shipped").await?;
//! let Registration::Pending(handle) = registration else { unreachable!() };
//!
//! // The ingestion adapter stores the event durably, then notifies.
//! let record = EventRecord::scoped("run-1", "order-42", "shipped", "{}")?;
//! sink.receive(record).await?;
//!
//! assert!(handle.wait().await?.is_delivered());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod executor;
pub mod ingest;
pub mod matcher;
pub mod scheduler;
pub mod steps;
pub mod testing;

pub use executor::{
    ExecutionResult, Outcome, ResumeExecutor, RunReport, RunRequest, UnitStatus, WorkRunner,
};
pub use ingest::EventSink;
pub use matcher::{EventMatcher, Registration, WaitHandle, WaitOutcome};
pub use scheduler::{ResumeScheduler, SweepReport};
pub use steps::{StepDisposition, StepGate};
