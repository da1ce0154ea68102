//! Tether core library.
//!
//! This crate provides the foundational types, key codec, and storage
//! ports for tether, an event-correlation and resume engine for
//! long-running units of work.
//!
//! # Overview
//!
//! A unit of work declares interest in an external event identified by a
//! business key and an event type, suspends without blocking a worker,
//! and is resumed — potentially after a process restart — once the event
//! is observed.
//!
//! # Key Components
//!
//! - **Key**: canonical correlation keys with scoped and legacy formats
//! - **Event**: the persisted event record and its pause/retry protocol
//! - **Step**: per-work-unit step state enabling idempotent resume
//! - **Store**: durable storage ports plus in-memory implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod key;
pub mod step;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use error::{Result, TetherError};
pub use event::EventRecord;
pub use key::{CanonicalKey, ParsedKey};
pub use step::{ScenarioContext, ScenarioState, StepState, StepStatus};
pub use store::{EventStore, MemoryEventStore, MemoryStepStore, StepStateStore, StoreFuture};
pub use types::{ScopeKey, SweepId};
