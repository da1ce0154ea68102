//! Error types for tether.
//!
//! Errors carry stable `Exxx` codes grouped by subsystem so that log
//! lines and operator runbooks can reference a failure without quoting
//! the whole message.

use thiserror::Error;

/// The main error type for tether operations.
#[derive(Error, Debug)]
pub enum TetherError {
    // =========================================================================
    // Key Errors (E100-E199)
    // =========================================================================
    /// A canonical key did not match either the scoped or the legacy format.
    #[error("E101: Malformed canonical key '{key}': {cause}")]
    MalformedKey {
        /// The offending key string.
        key: String,
        /// Reason the key could not be parsed.
        cause: String,
    },

    /// A key component was empty or contained `':'`.
    #[error("E102: Invalid key component '{component}': {cause}")]
    InvalidKeyComponent {
        /// The offending component.
        component: String,
        /// Reason the component was rejected.
        cause: String,
    },

    // =========================================================================
    // Event/Ingestion Errors (E200-E299)
    // =========================================================================
    /// An inbound event was missing its subject id or event type.
    ///
    /// Rejected at the mapping boundary; no waiter is affected.
    #[error("E201: Invalid inbound event: {cause}")]
    InvalidEvent {
        /// What was missing or malformed.
        cause: String,
    },

    /// No event record exists for the given canonical key.
    #[error("E202: No event record for key '{key}'")]
    EventNotFound {
        /// The key that was looked up.
        key: String,
    },

    // =========================================================================
    // Store Errors (E300-E399)
    // =========================================================================
    /// A store backend failed to complete an operation.
    #[error("E301: Store backend error: {cause}")]
    StoreBackend {
        /// Backend-specific failure description.
        cause: String,
    },

    // =========================================================================
    // Matcher Errors (E400-E499)
    // =========================================================================
    /// A wait handle's sender side was dropped before resolution.
    ///
    /// Indicates the matcher was torn down while waiters were pending.
    #[error("E401: Wait channel closed for key '{key}' before resolution")]
    WaitChannelClosed {
        /// The key the handle was registered under.
        key: String,
    },

    // =========================================================================
    // Configuration Errors (E500-E599)
    // =========================================================================
    /// A configuration value could not be used.
    #[error("E501: Invalid configuration for '{name}': {cause}")]
    InvalidConfig {
        /// The configuration key.
        name: String,
        /// Reason the value was rejected.
        cause: String,
    },
}

/// Result type alias using [`TetherError`].
pub type Result<T> = std::result::Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_is_send_sync() {
        _assert_send_sync::<TetherError>();
    }

    #[test]
    fn error_codes_in_messages() {
        let err = TetherError::EventNotFound {
            key: "run::order-1::shipped".to_string(),
        };
        assert!(err.to_string().starts_with("E202"));
    }
}
