//! Canonical correlation keys.
//!
//! A canonical key correlates a subject, an event type, and (optionally) a
//! scope. Two formats exist:
//!
//! - Scoped: `scope::subjectId::eventType` — the current format, which
//!   isolates work units that share a subject id.
//! - Legacy: `subjectId::eventType` — produced before scope qualification
//!   existed. Retained so old records and old registrations still match.
//!
//! The format is detected by counting separators when parsing.

use crate::error::{Result, TetherError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between key components.
pub const KEY_SEPARATOR: &str = "::";

/// A canonical correlation key.
///
/// Uniquely identifies at most one [`EventRecord`](crate::event::EventRecord);
/// event writes are upserts keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

/// Components of a parsed canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// The scope, absent for legacy keys.
    pub scope: Option<String>,
    /// The business subject id.
    pub subject_id: String,
    /// The event type.
    pub event_type: String,
}

// Any ':' is rejected, not just the full separator: a component ending in
// ':' next to one starting with ':' would render the same key string as a
// different component split, and two identities would share one record slot.
fn validate_component(component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(TetherError::InvalidKeyComponent {
            component: component.to_string(),
            cause: "component must not be empty".to_string(),
        });
    }
    if component.contains(':') {
        return Err(TetherError::InvalidKeyComponent {
            component: component.to_string(),
            cause: "component must not contain ':'".to_string(),
        });
    }
    Ok(())
}

impl CanonicalKey {
    /// Build a scope-qualified key: `scope::subjectId::eventType`.
    ///
    /// # Errors
    /// Returns `E102` if any component is empty or contains `':'`.
    pub fn scoped(scope: &str, subject_id: &str, event_type: &str) -> Result<Self> {
        validate_component(scope)?;
        validate_component(subject_id)?;
        validate_component(event_type)?;
        Ok(Self(format!(
            "{scope}{KEY_SEPARATOR}{subject_id}{KEY_SEPARATOR}{event_type}"
        )))
    }

    /// Build a legacy key: `subjectId::eventType`.
    ///
    /// Legacy keys can cross-correlate unrelated work units that share a
    /// subject id; prefer [`CanonicalKey::scoped`] wherever a scope exists.
    ///
    /// # Errors
    /// Returns `E102` if a component is empty or contains `':'`.
    pub fn legacy(subject_id: &str, event_type: &str) -> Result<Self> {
        validate_component(subject_id)?;
        validate_component(event_type)?;
        Ok(Self(format!("{subject_id}{KEY_SEPARATOR}{event_type}")))
    }

    /// Wrap an already-canonical key string without validation.
    ///
    /// For keys read back from a store, which were validated when built.
    #[must_use]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse this key into its components.
    ///
    /// # Errors
    /// Returns `E101` if the key has neither one nor two separators.
    pub fn parse(&self) -> Result<ParsedKey> {
        let parts: Vec<&str> = self.0.split(KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [subject_id, event_type] => Ok(ParsedKey {
                scope: None,
                subject_id: (*subject_id).to_string(),
                event_type: (*event_type).to_string(),
            }),
            [scope, subject_id, event_type] => Ok(ParsedKey {
                scope: Some((*scope).to_string()),
                subject_id: (*subject_id).to_string(),
                event_type: (*event_type).to_string(),
            }),
            _ => Err(TetherError::MalformedKey {
                key: self.0.clone(),
                cause: format!(
                    "expected 2 or 3 '{}'-separated components, found {}",
                    KEY_SEPARATOR,
                    parts.len()
                ),
            }),
        }
    }

    /// Whether this key carries a scope component.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.0.matches(KEY_SEPARATOR).count() == 2
    }

    /// Derive the legacy twin of a scoped key.
    ///
    /// Returns `None` for keys that are already legacy (or malformed).
    /// This is the migration bridge: a notification for a scoped key also
    /// resolves waiters that registered under the legacy format.
    #[must_use]
    pub fn legacy_equivalent(&self) -> Option<Self> {
        let parsed = self.parse().ok()?;
        parsed.scope.as_ref()?;
        Self::legacy(&parsed.subject_id, &parsed.event_type).ok()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
