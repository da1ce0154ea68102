//! Strongly-typed identifiers for tether entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a unit of work (a scenario, test run, or workflow instance).
///
/// Scope keys prevent unrelated work units from cross-matching on the same
/// subject id, and are the handles handed to the external runner when a
/// paused unit is re-driven.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Create a new scope key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ScopeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for one scheduler sweep.
///
/// Every sweep gets a fresh id so that log lines from overlapping manual
/// and timed sweeps can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepId(Uuid);

impl SweepId {
    /// Create a new random sweep id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SweepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SweepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sweep_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_display() {
        let key = ScopeKey::new("checkout-regression");
        assert_eq!(format!("{}", key), "checkout-regression");
        assert_eq!(key.as_str(), "checkout-regression");
    }

    #[test]
    fn sweep_id_uniqueness() {
        let a = SweepId::new();
        let b = SweepId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn sweep_id_display() {
        let id = SweepId::new();
        assert!(format!("{}", id).starts_with("sweep_"));
    }
}
