//! Identity domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated session as reported by the identity provider.
///
/// Exactly one `Session` exists at any time and it is owned exclusively by
/// the [`SessionManager`](super::SessionManager). It is created on a
/// successful sign-in or a restored check, and destroyed on sign-out or an
/// unrecoverable token error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier assigned by the identity provider
    pub identity_id: String,
    /// Email address the session was established for
    pub email: String,
    /// Timestamp when the session was issued
    pub issued_at: DateTime<Utc>,
    /// Whether the provider considers this session valid
    pub is_authenticated: bool,
}

/// Sign-in credentials forwarded verbatim to the identity provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

// Manual Debug so the password never lands in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
