//! Identity provider boundary.
//!
//! Defines the interface to the external identity provider. The provider is
//! never reimplemented here; concrete backends live outside this crate and
//! are injected as `Arc<dyn IdentityClient>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::model::{Credentials, Session};
use crate::error::Result;

/// Authentication transitions emitted by the identity provider.
///
/// The [`SessionManager`](super::SessionManager) subscribes to this stream
/// once for its lifetime and applies every event idempotently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A previously issued session was restored (e.g. after a reload).
    SessionRestored { session: Session },
    /// A fresh sign-in completed.
    SignedIn { session: Session },
    /// The session ended, either explicitly or provider-side.
    SignedOut,
    /// The access token was refreshed. Not a visible state transition.
    TokenRefreshed { session: Session },
}

/// An abstract boundary to the external identity provider.
///
/// # Errors
///
/// Implementations must map an invalid or expired refresh token to
/// [`SitelineError::AuthExpired`](crate::SitelineError::AuthExpired) and any
/// network failure to [`SitelineError::Transient`](crate::SitelineError::Transient);
/// the session state machine relies on that distinction.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Signs in with the given credentials and returns the new session.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session>;

    /// Terminates the current session at the provider.
    async fn sign_out(&self) -> Result<()>;

    /// Returns the current session, if one can be established or restored.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: a valid session exists
    /// - `Ok(None)`: no session; the user must sign in
    /// - `Err(_)`: the check itself failed
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Subscribes to the provider's authentication transition stream.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
