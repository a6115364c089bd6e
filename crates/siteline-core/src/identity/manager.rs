//! Session lifecycle management.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::{AuthEvent, IdentityClient};
use super::model::{Credentials, Session};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::tenant::TenantResolver;

/// Authentication state machine.
///
/// `Uninitialized → Checking → {Authenticated | Unauthenticated}`, with
/// `Authenticated → Unauthenticated` on sign-out or a fatal token error.
/// A token refresh replaces the session in place without a visible
/// transition.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// No check has run yet.
    Uninitialized,
    /// A session check is in flight and no prior session exists.
    Checking,
    /// A valid session is established.
    Authenticated(Session),
    /// No session exists; the user must sign in.
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Result of a [`SessionManager::check_session`] call.
///
/// Guarded calls report why they were collapsed instead of queuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The check ran and found a valid session.
    Authenticated,
    /// The check ran and found no session.
    Unauthenticated,
    /// Another check was already in flight; this call was a no-op.
    AlreadyInFlight,
    /// A check completed within the throttle window; this call was a no-op.
    Throttled,
}

/// Owns the authentication state machine.
///
/// `SessionManager` is responsible for:
/// - Establishing the session on startup and keeping it across reloads
/// - Collapsing re-entrant session checks (at most one in flight)
/// - Reacting to identity provider events, each applied idempotently
/// - Clearing a stuck loading flag on tab-visibility changes
/// - Sign-in/sign-out, including the full state reset on sign-out
///
/// Tenant resolution is triggered exactly once per session, tracked by a
/// flag that is reset only on sign-out.
pub struct SessionManager {
    /// Identity provider backend
    identity: Arc<dyn IdentityClient>,
    /// Tenant resolution, gated strictly behind an authenticated session
    tenant: Arc<TenantResolver>,
    config: SyncConfig,
    /// Current authentication state
    state: Arc<RwLock<AuthState>>,
    /// Held for the duration of one check; `try_lock` collapses re-entrant calls
    check_gate: Mutex<()>,
    /// Completion time of the last check, for the throttle window
    last_completed: RwLock<Option<Instant>>,
    /// Set while a check is in flight; cleared on completion or by the
    /// visibility safety timeout
    loading_since: RwLock<Option<Instant>>,
    /// Whether tenant resolution already ran for the current session
    profile_loaded: AtomicBool,
    /// Guards against a second event listener subscription
    listener_started: AtomicBool,
    /// Cancels the event listener on shutdown
    shutdown: CancellationToken,
}

impl SessionManager {
    /// Creates a new `SessionManager` with the given backends.
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        tenant: Arc<TenantResolver>,
        config: SyncConfig,
    ) -> Self {
        Self {
            identity,
            tenant,
            config,
            state: Arc::new(RwLock::new(AuthState::Uninitialized)),
            check_gate: Mutex::new(()),
            last_completed: RwLock::new(None),
            loading_since: RwLock::new(None),
            profile_loaded: AtomicBool::new(false),
            listener_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns a snapshot of the current authentication state.
    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Returns the current session, if authenticated.
    pub async fn current_session(&self) -> Option<Session> {
        match &*self.state.read().await {
            AuthState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Whether a session check is currently marked as loading.
    pub async fn is_loading(&self) -> bool {
        self.loading_since.read().await.is_some()
    }

    /// Checks the session with the identity provider.
    ///
    /// Idempotent and safe to call repeatedly: calls arriving while another
    /// check is in flight, or within the throttle window of the last
    /// completed check, are collapsed into no-ops and never queued.
    ///
    /// On success with a valid identity the state transitions to
    /// `Authenticated` and tenant resolution is triggered once per session.
    ///
    /// # Errors
    ///
    /// A fatal token error forces a sign-out and full state reset. A
    /// transient failure leaves the prior state untouched and is surfaced
    /// as a retryable error.
    pub async fn check_session(&self) -> Result<CheckOutcome> {
        // At most one check is ever in flight.
        let Ok(_gate) = self.check_gate.try_lock() else {
            tracing::debug!(target: "session", "check already in flight, collapsing");
            return Ok(CheckOutcome::AlreadyInFlight);
        };

        if let Some(last) = *self.last_completed.read().await {
            if last.elapsed() < self.config.check_throttle() {
                tracing::debug!(target: "session", "check within throttle window, skipping");
                return Ok(CheckOutcome::Throttled);
            }
        }

        let prior = self.state.read().await.clone();
        if !prior.is_authenticated() {
            *self.state.write().await = AuthState::Checking;
        }
        *self.loading_since.write().await = Some(Instant::now());

        let result = self.identity.current_session().await;
        *self.loading_since.write().await = None;

        match result {
            Ok(Some(session)) => {
                *self.state.write().await = AuthState::Authenticated(session.clone());
                *self.last_completed.write().await = Some(Instant::now());
                self.ensure_profile_loaded(&session).await;
                Ok(CheckOutcome::Authenticated)
            }
            Ok(None) => {
                *self.state.write().await = AuthState::Unauthenticated;
                *self.last_completed.write().await = Some(Instant::now());
                if prior.is_authenticated() {
                    // Silent provider-side expiry: the profile and site
                    // selection require a session and must not outlive it.
                    // The persisted key stays; it restores on the next
                    // sign-in of the same identity.
                    tracing::warn!(target: "session", "provider session vanished, clearing derived state");
                    self.profile_loaded.store(false, Ordering::SeqCst);
                    self.tenant.clear().await;
                }
                Ok(CheckOutcome::Unauthenticated)
            }
            Err(e) if e.is_fatal_auth() => {
                tracing::warn!(target: "session", "fatal token error, forcing sign-out: {e}");
                self.reset_local_state().await;
                Err(e)
            }
            Err(e) => {
                // Transient failure: no state transition.
                *self.state.write().await = prior;
                Err(e)
            }
        }
    }

    /// Signs in with the given credentials.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.identity.sign_in(credentials).await?;
        tracing::info!(target: "session", identity_id = %session.identity_id, "signed in");

        *self.state.write().await = AuthState::Authenticated(session.clone());
        *self.last_completed.write().await = Some(Instant::now());
        self.ensure_profile_loaded(&session).await;

        Ok(session)
    }

    /// Signs out and resets all derived state.
    ///
    /// Clears, in order: the session, the profile, the site selection, and
    /// the persisted selection key.
    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        self.reset_local_state().await;
        tracing::info!(target: "session", "signed out");
        Ok(())
    }

    /// Reacts to the tab becoming visible again.
    ///
    /// Intentionally never re-runs session or profile loads; coupling
    /// visibility events to data refresh causes reload loops. The only
    /// action is clearing a loading flag left set past the safety timeout.
    /// The underlying request is not cancelled.
    pub async fn handle_visibility_change(&self, visible: bool) {
        if !visible {
            return;
        }

        let mut loading = self.loading_since.write().await;
        if let Some(since) = *loading {
            if since.elapsed() >= self.config.stuck_loading_timeout() {
                tracing::warn!(target: "session", "clearing loading flag stuck past safety timeout");
                *loading = None;
            }
        }
    }

    /// Spawns the background task consuming the identity provider's event
    /// stream.
    ///
    /// The subscription is established once for the manager's lifetime;
    /// repeated calls are no-ops. The task stops when [`shutdown`] is called
    /// or the provider closes the stream.
    ///
    /// [`shutdown`]: Self::shutdown
    pub fn spawn_event_listener(self: &Arc<Self>) {
        if self.listener_started.swap(true, Ordering::SeqCst) {
            tracing::warn!(target: "session", "event listener already running, skipping");
            return;
        }

        let manager = Arc::clone(self);
        let mut rx = self.identity.subscribe();
        let cancel = self.shutdown.clone();

        tokio::spawn(async move {
            tracing::debug!(target: "session", "auth event listener started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => manager.apply_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(target: "session", skipped, "auth event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(target: "session", "auth event listener stopped");
        });
    }

    /// Applies one provider event. Idempotent with respect to already
    /// applied state.
    pub(crate) async fn apply_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SessionRestored { session } | AuthEvent::SignedIn { session } => {
                let already_applied = matches!(
                    &*self.state.read().await,
                    AuthState::Authenticated(current) if current.identity_id == session.identity_id
                );
                if !already_applied {
                    *self.state.write().await = AuthState::Authenticated(session.clone());
                }
                self.ensure_profile_loaded(&session).await;
            }
            AuthEvent::TokenRefreshed { session } => {
                // No visible transition: replace the session in place.
                let mut state = self.state.write().await;
                if state.is_authenticated() {
                    tracing::debug!(target: "session", "token refreshed");
                    *state = AuthState::Authenticated(session);
                }
            }
            AuthEvent::SignedOut => {
                self.reset_local_state().await;
            }
        }
    }

    /// Stops the event listener task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Triggers tenant resolution exactly once per session.
    ///
    /// The flag stays set even if resolution fails; recovery goes through
    /// the resolver's explicit refresh, never an implicit reload.
    async fn ensure_profile_loaded(&self, session: &Session) {
        if self.profile_loaded.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.tenant.resolve(&session.identity_id).await {
            tracing::warn!(target: "session", "tenant resolution failed: {e}");
        }
    }

    /// Resets the session, profile, site selection, and persisted key, in
    /// that order. Idempotent.
    async fn reset_local_state(&self) {
        *self.state.write().await = AuthState::Unauthenticated;
        self.profile_loaded.store(false, Ordering::SeqCst);
        self.tenant.clear().await;
        if let Err(e) = self.tenant.clear_persisted().await {
            tracing::warn!(target: "session", "failed to clear persisted selection: {e}");
        }
        *self.last_completed.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SitelineError;
    use crate::tenant::{DirectoryRepository, Profile, ProfileState, SelectionStore, Site};
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn session(identity_id: &str) -> Session {
        Session {
            identity_id: identity_id.to_string(),
            email: format!("{}@example.com", identity_id),
            issued_at: Utc::now(),
            is_authenticated: true,
        }
    }

    // Mock IdentityClient for testing
    struct MockIdentityClient {
        session: StdMutex<Option<Session>>,
        fail_with: StdMutex<Option<SitelineError>>,
        check_calls: AtomicUsize,
        events: broadcast::Sender<AuthEvent>,
    }

    impl MockIdentityClient {
        fn new(session: Option<Session>) -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                session: StdMutex::new(session),
                fail_with: StdMutex::new(None),
                check_calls: AtomicUsize::new(0),
                events,
            }
        }

        fn fail_next_with(&self, error: SitelineError) {
            *self.fail_with.lock().unwrap() = Some(error);
        }

        fn check_calls(&self) -> usize {
            self.check_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IdentityClient for MockIdentityClient {
        async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
            let new_session = session(credentials.email.split('@').next().unwrap_or("user"));
            *self.session.lock().unwrap() = Some(new_session.clone());
            Ok(new_session)
        }

        async fn sign_out(&self) -> Result<()> {
            *self.session.lock().unwrap() = None;
            Ok(())
        }

        async fn current_session(&self) -> Result<Option<Session>> {
            self.check_calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrently issued checks can observe the gate.
            tokio::task::yield_now().await;
            if let Some(error) = self.fail_with.lock().unwrap().take() {
                return Err(error);
            }
            Ok(self.session.lock().unwrap().clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    // Mock DirectoryRepository for testing
    struct MockDirectory {
        profiles: HashMap<String, Profile>,
        profile_calls: AtomicUsize,
    }

    impl MockDirectory {
        fn with_profile(identity_id: &str) -> Self {
            let profile = Profile {
                profile_id: identity_id.to_string(),
                organization_key: "org-1".to_string(),
                linked_site_id: Some("site-a".to_string()),
                onboarding_complete: true,
                is_active: true,
            };
            Self {
                profiles: HashMap::from([(identity_id.to_string(), profile)]),
                profile_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl DirectoryRepository for MockDirectory {
        async fn find_profile(&self, identity_id: &str) -> Result<Option<Profile>> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.profiles.get(identity_id).cloned())
        }

        async fn list_sites(&self, _organization_key: &str) -> Result<Vec<Site>> {
            Ok(vec![
                Site {
                    site_id: "site-a".to_string(),
                    label: "Site A".to_string(),
                    is_primary: true,
                },
                Site {
                    site_id: "site-b".to_string(),
                    label: "Site B".to_string(),
                    is_primary: false,
                },
            ])
        }
    }

    // Mock SelectionStore for testing
    #[derive(Default)]
    struct MockSelectionStore {
        value: StdMutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl SelectionStore for MockSelectionStore {
        async fn get(&self) -> Result<Option<String>> {
            Ok(self.value.lock().unwrap().clone())
        }

        async fn set(&self, site_id: &str) -> Result<()> {
            *self.value.lock().unwrap() = Some(site_id.to_string());
            Ok(())
        }

        async fn remove(&self) -> Result<()> {
            *self.value.lock().unwrap() = None;
            Ok(())
        }
    }

    struct Fixture {
        identity: Arc<MockIdentityClient>,
        directory: Arc<MockDirectory>,
        store: Arc<MockSelectionStore>,
        manager: Arc<SessionManager>,
    }

    fn fixture(session: Option<Session>) -> Fixture {
        let identity = Arc::new(MockIdentityClient::new(session));
        let directory = Arc::new(MockDirectory::with_profile("id-1"));
        let store = Arc::new(MockSelectionStore::default());
        let tenant = Arc::new(TenantResolver::new(directory.clone(), store.clone()));
        let manager = Arc::new(SessionManager::new(
            identity.clone(),
            tenant,
            SyncConfig::default(),
        ));
        Fixture {
            identity,
            directory,
            store,
            manager,
        }
    }

    #[tokio::test]
    async fn test_concurrent_checks_collapse_to_one_provider_call() {
        let f = fixture(Some(session("id-1")));

        let (a, b, c) = tokio::join!(
            f.manager.check_session(),
            f.manager.check_session(),
            f.manager.check_session(),
        );

        assert_eq!(f.identity.check_calls(), 1);
        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == CheckOutcome::Authenticated)
                .count(),
            1
        );
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == CheckOutcome::AlreadyInFlight)
                .count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_within_throttle_window_are_noops() {
        let f = fixture(Some(session("id-1")));

        assert_eq!(
            f.manager.check_session().await.unwrap(),
            CheckOutcome::Authenticated
        );

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            f.manager.check_session().await.unwrap(),
            CheckOutcome::Throttled
        );
        assert_eq!(f.identity.check_calls(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            f.manager.check_session().await.unwrap(),
            CheckOutcome::Authenticated
        );
        assert_eq!(f.identity.check_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_loads_exactly_once_per_session() {
        let f = fixture(Some(session("id-1")));

        f.manager.check_session().await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        f.manager.check_session().await.unwrap();

        assert_eq!(f.identity.check_calls(), 2);
        assert_eq!(f.directory.profile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_session_transitions_to_unauthenticated() {
        let f = fixture(None);

        assert_eq!(
            f.manager.check_session().await.unwrap(),
            CheckOutcome::Unauthenticated
        );
        assert_eq!(f.manager.state().await, AuthState::Unauthenticated);
        assert_eq!(f.directory.profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_leaves_prior_state() {
        let f = fixture(Some(session("id-1")));

        f.manager.check_session().await.unwrap();
        assert!(f.manager.state().await.is_authenticated());

        tokio::time::advance(Duration::from_secs(11)).await;
        f.identity
            .fail_next_with(SitelineError::transient("connection reset"));

        let result = f.manager.check_session().await;
        assert!(matches!(result, Err(e) if e.is_transient()));
        assert!(f.manager.state().await.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_token_error_forces_full_reset() {
        let f = fixture(Some(session("id-1")));

        f.manager.check_session().await.unwrap();
        f.manager.select_site_for_test().await;

        tokio::time::advance(Duration::from_secs(11)).await;
        f.identity
            .fail_next_with(SitelineError::auth_expired("refresh token rejected"));

        let result = f.manager.check_session().await;
        assert!(matches!(result, Err(e) if e.is_fatal_auth()));
        assert_eq!(f.manager.state().await, AuthState::Unauthenticated);
        assert_eq!(f.store.get().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_provider_session_clears_derived_state() {
        let f = fixture(Some(session("id-1")));

        f.manager.check_session().await.unwrap();
        f.manager.select_site_for_test().await;
        assert!(f.manager.tenant.profile_state().await.profile().is_some());

        // The provider drops the session without emitting SignedOut.
        *f.identity.session.lock().unwrap() = None;
        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(
            f.manager.check_session().await.unwrap(),
            CheckOutcome::Unauthenticated
        );

        // The profile and site cannot outlive the session.
        assert_eq!(f.manager.state().await, AuthState::Unauthenticated);
        assert_eq!(
            f.manager.tenant.profile_state().await,
            ProfileState::NotLoaded
        );
        assert_eq!(f.manager.tenant.active_site_id().await, None);
        // No explicit sign-out happened, so the persisted key survives.
        assert_eq!(f.store.get().await.unwrap(), Some("site-b".to_string()));

        // A later sign-in resolves the profile afresh.
        f.manager
            .sign_in(&Credentials {
                email: "id-1@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(f.directory.profile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_profile_site_and_key() {
        let f = fixture(Some(session("id-1")));

        f.manager.check_session().await.unwrap();
        f.manager.select_site_for_test().await;
        assert_eq!(f.store.get().await.unwrap(), Some("site-b".to_string()));

        f.manager.sign_out().await.unwrap();

        assert_eq!(f.manager.state().await, AuthState::Unauthenticated);
        assert_eq!(
            f.manager.tenant.profile_state().await,
            ProfileState::NotLoaded
        );
        assert_eq!(f.manager.tenant.active_site_id().await, None);
        assert_eq!(f.store.get().await.unwrap(), None);

        // The profile gate resets, so the next session resolves again.
        f.manager
            .apply_event(AuthEvent::SignedIn {
                session: session("id-1"),
            })
            .await;
        assert_eq!(f.directory.profile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_change_clears_only_stuck_loading_flag() {
        let f = fixture(Some(session("id-1")));

        // A freshly set loading flag survives a visibility change.
        *f.manager.loading_since.write().await = Some(Instant::now());
        f.manager.handle_visibility_change(true).await;
        assert!(f.manager.is_loading().await);

        // Past the safety timeout it is cleared, without any provider call.
        tokio::time::advance(Duration::from_secs(9)).await;
        f.manager.handle_visibility_change(true).await;
        assert!(!f.manager.is_loading().await);
        assert_eq!(f.identity.check_calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_events_apply_idempotently() {
        let f = fixture(Some(session("id-1")));

        let event = AuthEvent::SignedIn {
            session: session("id-1"),
        };
        f.manager.apply_event(event.clone()).await;
        f.manager.apply_event(event).await;

        assert!(f.manager.state().await.is_authenticated());
        assert_eq!(f.directory.profile_calls.load(Ordering::SeqCst), 1);

        f.manager.apply_event(AuthEvent::SignedOut).await;
        f.manager.apply_event(AuthEvent::SignedOut).await;
        assert_eq!(f.manager.state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_token_refresh_is_not_a_visible_transition() {
        let f = fixture(Some(session("id-1")));
        f.manager.check_session().await.unwrap();

        let mut refreshed = session("id-1");
        refreshed.issued_at = Utc::now();
        f.manager
            .apply_event(AuthEvent::TokenRefreshed {
                session: refreshed.clone(),
            })
            .await;

        assert_eq!(f.manager.state().await, AuthState::Authenticated(refreshed));

        // A refresh arriving while signed out is ignored.
        f.manager.apply_event(AuthEvent::SignedOut).await;
        f.manager
            .apply_event(AuthEvent::TokenRefreshed {
                session: session("id-1"),
            })
            .await;
        assert_eq!(f.manager.state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_event_listener_reacts_to_provider_stream() {
        let f = fixture(None);

        f.manager.spawn_event_listener();
        // Second spawn is a guarded no-op.
        f.manager.spawn_event_listener();

        f.identity
            .events
            .send(AuthEvent::SignedIn {
                session: session("id-1"),
            })
            .unwrap();

        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert!(f.manager.state().await.is_authenticated());

        f.manager.shutdown();
    }

    impl SessionManager {
        /// Switches away from the restored site, for reset assertions.
        async fn select_site_for_test(&self) {
            self.tenant.select_site("site-b").await.unwrap();
        }
    }
}
