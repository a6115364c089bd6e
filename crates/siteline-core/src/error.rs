//! Error types for the Siteline application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Siteline application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
///
/// Only `AuthExpired` is allowed to force a state transition (full reset and
/// sign-out). Every other variant is contained within the component that
/// detected it and surfaced as an advisory value alongside the best-effort
/// result.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SitelineError {
    /// Fatal authentication error (invalid or expired refresh token).
    /// Forces a full state reset; the user must sign in again.
    #[error("Session expired: {0}")]
    AuthExpired(String),

    /// Transient network failure. The operation is retryable and the prior
    /// state is left untouched.
    #[error("Transient error: {0}")]
    Transient(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound { entity_type: String, id: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SitelineError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an AuthExpired error
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::AuthExpired(message.into())
    }

    /// Creates a Transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this error must force a sign-out and full state reset.
    pub fn is_fatal_auth(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }

    /// Check if this error is retryable without a state transition.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SitelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SitelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SitelineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SitelineError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (transitional, should be removed eventually)
impl From<anyhow::Error> for SitelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, SitelineError>`.
pub type Result<T> = std::result::Result<T, SitelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_auth_classification() {
        assert!(SitelineError::auth_expired("refresh token rejected").is_fatal_auth());
        assert!(!SitelineError::transient("timeout").is_fatal_auth());
    }

    #[test]
    fn test_transient_classification() {
        assert!(SitelineError::transient("connection reset").is_transient());
        assert!(!SitelineError::auth_expired("expired").is_transient());
        assert!(!SitelineError::internal("bug").is_transient());
    }

    #[test]
    fn test_not_found_display() {
        let err = SitelineError::not_found("site", "site-9");
        assert_eq!(err.to_string(), "Entity not found: site 'site-9'");
        assert!(err.is_not_found());
    }
}
