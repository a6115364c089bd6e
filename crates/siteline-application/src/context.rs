//! Application context wiring the synchronization components together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use siteline_core::config::SyncConfig;
use siteline_core::error::{Result, SitelineError};
use siteline_core::identity::{
    AuthState, CheckOutcome, Credentials, IdentityClient, Session, SessionManager,
};
use siteline_core::notification::{
    AlertContext, AlertRule, FeedReport, NotificationAggregator, NotificationItem, PermanentSource,
    UnreadCounts,
};
use siteline_core::realtime::{PushChannel, RealtimeCountBridge};
use siteline_core::tenant::{
    DirectoryRepository, ProfileState, SelectionStore, Site, SiteChangedCallback, TenantResolver,
};

/// The synchronization layer's single entry point for the surrounding UI.
///
/// Constructed once per application instance and passed by reference;
/// there is no implicit global state. The lifecycle is explicit:
/// [`initialize`] wires the event listener, runs the first session check,
/// and activates notifications if a session exists; [`shutdown`] tears
/// everything down deterministically.
///
/// [`initialize`]: Self::initialize
/// [`shutdown`]: Self::shutdown
pub struct AppContext {
    sessions: Arc<SessionManager>,
    tenants: Arc<TenantResolver>,
    notifications: Arc<NotificationAggregator>,
    bridge: Arc<RealtimeCountBridge>,
    /// Whether the signed-in user holds a privileged role; set by the host
    /// once its own role information is available
    privileged: AtomicBool,
}

impl AppContext {
    /// Creates the context from the injected boundary backends.
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        directory: Arc<dyn DirectoryRepository>,
        selection: Arc<dyn SelectionStore>,
        permanent: Arc<dyn PermanentSource>,
        rules: Vec<Arc<dyn AlertRule>>,
        push: Arc<dyn PushChannel>,
        config: SyncConfig,
    ) -> Self {
        let tenants = Arc::new(TenantResolver::new(directory, selection));
        let sessions = Arc::new(SessionManager::new(
            identity,
            tenants.clone(),
            config.clone(),
        ));
        let notifications = Arc::new(NotificationAggregator::new(permanent, rules));
        let bridge = Arc::new(RealtimeCountBridge::new(
            push,
            notifications.clone(),
            &config,
        ));

        Self {
            sessions,
            tenants,
            notifications,
            bridge,
            privileged: AtomicBool::new(false),
        }
    }

    /// Initializes the synchronization layer.
    ///
    /// Subscribes to the identity provider's event stream, runs the first
    /// session check, and, when a session exists, loads the feed and starts
    /// the count bridge.
    ///
    /// # Errors
    ///
    /// A fatal token error propagates after the state reset. Transient
    /// check failures are logged and swallowed; the caller can retry via
    /// [`check_session`](Self::check_session).
    pub async fn initialize(&self) -> Result<()> {
        self.sessions.spawn_event_listener();

        match self.sessions.check_session().await {
            Ok(CheckOutcome::Authenticated) => {
                self.activate_notifications().await?;
            }
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                tracing::warn!(target: "app", "initial session check failed, retryable: {e}");
            }
            Err(e) => return Err(e),
        }

        tracing::info!(target: "app", "synchronization layer initialized");
        Ok(())
    }

    /// Tears down background tasks and subscriptions. Idempotent.
    pub async fn shutdown(&self) {
        self.bridge.shutdown().await;
        self.sessions.shutdown();
        tracing::info!(target: "app", "synchronization layer stopped");
    }

    // ============================================================================
    // Session commands
    // ============================================================================

    /// Re-checks the session; guarded and throttled, safe to call freely.
    pub async fn check_session(&self) -> Result<CheckOutcome> {
        let outcome = self.sessions.check_session().await?;
        if outcome == CheckOutcome::Authenticated && !self.bridge.is_running().await {
            self.activate_notifications().await?;
        }
        Ok(outcome)
    }

    /// Signs in and activates notifications for the new session.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.sessions.sign_in(credentials).await?;
        self.activate_notifications().await?;
        Ok(session)
    }

    /// Signs out: tears the bridge down first so no subscription outlives
    /// the session, then resets session, profile, site, and persisted key.
    pub async fn sign_out(&self) -> Result<()> {
        self.bridge.shutdown().await;
        self.sessions.sign_out().await
    }

    /// Forwards a tab-visibility change to the session manager.
    pub async fn handle_visibility_change(&self, visible: bool) {
        self.sessions.handle_visibility_change(visible).await;
    }

    /// Returns the current authentication state.
    pub async fn auth_state(&self) -> AuthState {
        self.sessions.state().await
    }

    // ============================================================================
    // Tenant commands
    // ============================================================================

    /// Returns the profile resolution state.
    pub async fn profile_state(&self) -> ProfileState {
        self.tenants.profile_state().await
    }

    /// Explicitly re-resolves the profile and sites for the current session.
    pub async fn refresh_profile(&self) -> Result<ProfileState> {
        let session = self
            .sessions
            .current_session()
            .await
            .ok_or_else(|| SitelineError::auth_expired("no authenticated session"))?;
        self.tenants.refresh(&session.identity_id).await
    }

    /// Returns the resolved sibling sites.
    pub async fn sites(&self) -> Vec<Site> {
        self.tenants.sites().await
    }

    /// Whether the user can switch between multiple sites.
    pub async fn multi_site_active(&self) -> bool {
        self.tenants.multi_site_active().await
    }

    /// Returns the active site, if one is selected.
    pub async fn active_site(&self) -> Option<Site> {
        self.tenants.active_site().await
    }

    /// Switches the active site; the identifier must belong to the
    /// resolved site set.
    pub async fn select_site(&self, site_id: &str) -> Result<Site> {
        self.tenants.select_site(site_id).await
    }

    /// Registers the hook fired after a successful site switch.
    pub async fn on_site_changed(&self, callback: SiteChangedCallback) {
        self.tenants.set_site_changed_callback(callback).await;
    }

    // ============================================================================
    // Notification commands
    // ============================================================================

    /// Marks the signed-in user as holding a privileged role, enabling the
    /// privileged-only alert rules on subsequent loads.
    pub fn set_privileged(&self, privileged: bool) {
        self.privileged.store(privileged, Ordering::SeqCst);
    }

    /// Reloads the full merged feed.
    pub async fn reload_notifications(&self) -> Result<FeedReport> {
        let ctx = self
            .alert_context()
            .await
            .ok_or_else(|| SitelineError::auth_expired("no authenticated session"))?;
        Ok(self.notifications.load_all(&ctx).await)
    }

    /// Returns the merged feed.
    pub async fn notifications(&self) -> Vec<NotificationItem> {
        self.notifications.all().await
    }

    /// Returns the permanent subset of the feed.
    pub async fn permanent_notifications(&self) -> Vec<NotificationItem> {
        self.notifications.permanent_only().await
    }

    /// Returns the dynamic subset of the feed.
    pub async fn dynamic_notifications(&self) -> Vec<NotificationItem> {
        self.notifications.dynamic_only().await
    }

    /// Marks one permanent notification as read.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.notifications.mark_read(id).await
    }

    /// Marks all permanent notifications as read.
    pub async fn mark_all_read(&self) -> Result<()> {
        self.notifications.mark_all_read().await
    }

    /// Returns a receiver observing the live unread counts.
    pub fn subscribe_counts(&self) -> watch::Receiver<UnreadCounts> {
        self.bridge.subscribe_counts()
    }

    // ============================================================================
    // Internal
    // ============================================================================

    /// Builds the recipient context for the current session, if any.
    async fn alert_context(&self) -> Option<AlertContext> {
        let session = self.sessions.current_session().await?;
        Some(AlertContext {
            identity_id: session.identity_id,
            site_id: self.tenants.active_site_id().await,
            privileged: self.privileged.load(Ordering::SeqCst),
        })
    }

    /// Loads the initial feed and starts the count bridge.
    async fn activate_notifications(&self) -> Result<()> {
        let ctx = self
            .alert_context()
            .await
            .ok_or_else(|| SitelineError::internal("notification activation without a session"))?;

        let report = self.notifications.load_all(&ctx).await;
        if report.is_degraded() {
            tracing::warn!(target: "app", "initial feed load degraded");
        }

        self.bridge.start(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use siteline_core::identity::AuthEvent;
    use siteline_core::notification::{AlertKind, DynamicAlert, PermanentNotification, Priority};
    use siteline_core::realtime::PushEvent;
    use siteline_core::tenant::Profile;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::broadcast;

    fn session(identity_id: &str) -> Session {
        Session {
            identity_id: identity_id.to_string(),
            email: format!("{}@example.com", identity_id),
            issued_at: Utc::now(),
            is_authenticated: true,
        }
    }

    struct MockIdentityClient {
        session: StdMutex<Option<Session>>,
        events: broadcast::Sender<AuthEvent>,
    }

    impl MockIdentityClient {
        fn new(session: Option<Session>) -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                session: StdMutex::new(session),
                events,
            }
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
            Ok(self.session.lock().unwrap().clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    struct MockDirectory;

    #[async_trait::async_trait]
    impl DirectoryRepository for MockDirectory {
        async fn find_profile(&self, identity_id: &str) -> Result<Option<Profile>> {
            Ok(Some(Profile {
                profile_id: identity_id.to_string(),
                organization_key: "org-1".to_string(),
                linked_site_id: Some("site-a".to_string()),
                onboarding_complete: true,
                is_active: true,
            }))
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

    #[derive(Default)]
    struct MockPermanentSource {
        fetch_calls: AtomicUsize,
        count_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PermanentSource for MockPermanentSource {
        async fn fetch_unread(&self, _ctx: &AlertContext) -> Result<Vec<PermanentNotification>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn acknowledge(&self, _source_id: &str) -> Result<()> {
            Ok(())
        }

        async fn acknowledge_many(&self, _source_ids: &[String]) -> Result<()> {
            Ok(())
        }

        async fn count_unread(&self, _ctx: &AlertContext) -> Result<usize> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    struct PrivilegedOnlyRule {
        evaluations: Arc<StdMutex<Vec<bool>>>,
    }

    #[async_trait::async_trait]
    impl AlertRule for PrivilegedOnlyRule {
        fn kind(&self) -> AlertKind {
            AlertKind::TicketUnassignedHighPriority
        }

        async fn evaluate(&self, ctx: &AlertContext) -> Result<Vec<DynamicAlert>> {
            self.evaluations.lock().unwrap().push(ctx.privileged);
            if !ctx.privileged {
                return Ok(Vec::new());
            }
            Ok(vec![DynamicAlert {
                id: "d1".to_string(),
                title: "Unassigned high-priority ticket".to_string(),
                description: String::new(),
                priority: Priority::High,
                timestamp: Utc::now(),
                link: None,
                kind: AlertKind::TicketUnassignedHighPriority,
            }])
        }

        // Keep the count path out of the evaluation log.
        async fn count(&self, ctx: &AlertContext) -> Result<usize> {
            Ok(usize::from(ctx.privileged))
        }
    }

    struct MockPushChannel {
        tx: broadcast::Sender<PushEvent>,
        subscribes: AtomicUsize,
        unsubscribes: AtomicUsize,
    }

    impl MockPushChannel {
        fn new() -> Self {
            let (tx, _) = broadcast::channel(16);
            Self {
                tx,
                subscribes: AtomicUsize::new(0),
                unsubscribes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl PushChannel for MockPushChannel {
        async fn subscribe(&self) -> Result<broadcast::Receiver<PushEvent>> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(self.tx.subscribe())
        }

        async fn unsubscribe(&self) -> Result<()> {
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MockSelectionStore>,
        source: Arc<MockPermanentSource>,
        push: Arc<MockPushChannel>,
        rule_evaluations: Arc<StdMutex<Vec<bool>>>,
        context: AppContext,
    }

    fn fixture(signed_in: bool) -> Fixture {
        let identity = Arc::new(MockIdentityClient::new(
            signed_in.then(|| session("id-1")),
        ));
        let store = Arc::new(MockSelectionStore::default());
        let source = Arc::new(MockPermanentSource::default());
        let push = Arc::new(MockPushChannel::new());
        let rule_evaluations = Arc::new(StdMutex::new(Vec::new()));
        let rules: Vec<Arc<dyn AlertRule>> = vec![Arc::new(PrivilegedOnlyRule {
            evaluations: rule_evaluations.clone(),
        })];

        let context = AppContext::new(
            identity,
            Arc::new(MockDirectory),
            store.clone(),
            source.clone(),
            rules,
            push.clone(),
            SyncConfig::default(),
        );

        Fixture {
            store,
            source,
            push,
            rule_evaluations,
            context,
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_with_session_activates_notifications() {
        let f = fixture(true);

        f.context.initialize().await.unwrap();
        settle().await;

        assert!(f.context.auth_state().await.is_authenticated());
        assert!(f.context.profile_state().await.profile().is_some());
        // Restored selection defaults to the linked site.
        assert_eq!(
            f.context.active_site().await.map(|s| s.site_id),
            Some("site-a".to_string())
        );
        assert_eq!(f.push.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(f.source.fetch_calls.load(Ordering::SeqCst), 1);

        f.context.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_without_session_stays_idle() {
        let f = fixture(false);

        f.context.initialize().await.unwrap();
        settle().await;

        assert_eq!(f.context.auth_state().await, AuthState::Unauthenticated);
        assert_eq!(f.push.subscribes.load(Ordering::SeqCst), 0);
        assert_eq!(f.source.fetch_calls.load(Ordering::SeqCst), 0);

        f.context.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_leaves_no_residual_subscriptions() {
        let f = fixture(true);
        f.context.initialize().await.unwrap();
        f.context.select_site("site-b").await.unwrap();
        settle().await;

        f.context.sign_out().await.unwrap();

        assert_eq!(f.context.auth_state().await, AuthState::Unauthenticated);
        assert_eq!(f.context.profile_state().await, ProfileState::NotLoaded);
        assert_eq!(f.context.active_site().await, None);
        assert_eq!(f.store.get().await.unwrap(), None);
        assert_eq!(f.push.unsubscribes.load(Ordering::SeqCst), 1);

        // Push events after sign-out refresh nothing.
        let before = f.source.count_calls.load(Ordering::SeqCst);
        let _ = f.push.tx.send(PushEvent::NotificationInserted {
            source_id: "record-1".to_string(),
        });
        settle().await;
        assert_eq!(f.source.count_calls.load(Ordering::SeqCst), before);

        f.context.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_after_sign_out_resubscribes() {
        let f = fixture(true);
        f.context.initialize().await.unwrap();
        f.context.sign_out().await.unwrap();

        f.context
            .sign_in(&Credentials {
                email: "id-1@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        assert!(f.context.auth_state().await.is_authenticated());
        assert_eq!(f.push.subscribes.load(Ordering::SeqCst), 2);

        f.context.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_privileged_flag_reaches_the_rule_battery() {
        let f = fixture(true);
        f.context.set_privileged(true);

        f.context.initialize().await.unwrap();

        assert_eq!(f.rule_evaluations.lock().unwrap().as_slice(), &[true]);
        assert_eq!(f.context.dynamic_notifications().await.len(), 1);

        f.context.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_requires_a_session() {
        let f = fixture(false);
        f.context.initialize().await.unwrap();

        let result = f.context.reload_notifications().await;
        assert!(matches!(result, Err(e) if e.is_fatal_auth()));

        f.context.shutdown().await;
    }
}
