//! Test doubles for engine collaborators.

use crate::executor::{RunReport, RunRequest, RunnerFuture, UnitStatus, WorkRunner};
use parking_lot::Mutex;
use tether_core::error::TetherError;
use tether_core::types::ScopeKey;

/// What a [`RecordingRunner`] does with the units it is asked to run.
pub enum RunnerBehavior {
    /// Report every unit as passed.
    PassAll,
    /// Report the named unit as failed, everything else as passed.
    FailUnit(ScopeKey),
    /// Report the named unit as still skipped, everything else as passed.
    SkipUnit(ScopeKey),
    /// Return an error without reporting any unit.
    Error,
}

/// Runner double that records every request it receives.
pub struct RecordingRunner {
    /// Every request, in invocation order.
    pub calls: Mutex<Vec<RunRequest>>,
    /// Behavior applied to each request.
    pub behavior: RunnerBehavior,
}

impl RecordingRunner {
    /// Create a runner with the given behavior.
    #[must_use]
    pub fn new(behavior: RunnerBehavior) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            behavior,
        }
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl WorkRunner for RecordingRunner {
    fn run(&self, request: RunRequest) -> RunnerFuture<'_, RunReport> {
        Box::pin(async move {
            self.calls.lock().push(request.clone());
            match &self.behavior {
                RunnerBehavior::Error => Err(TetherError::StoreBackend {
                    cause: "runner exploded".to_string(),
                }),
                behavior => {
                    let mut report = RunReport::default();
                    for target in &request.targets {
                        let status = match behavior {
                            RunnerBehavior::FailUnit(k) if k == target => UnitStatus::Failed,
                            RunnerBehavior::SkipUnit(k) if k == target => UnitStatus::Skipped,
                            _ => UnitStatus::Passed,
                        };
                        report.units.insert(target.clone(), status);
                    }
                    Ok(report)
                }
            }
        })
    }
}
