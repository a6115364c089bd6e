//! Tenant resolution and site switching.

use std::sync::Arc;
use tokio::sync::RwLock;

use super::model::{Profile, ProfileState, Site};
use super::repository::DirectoryRepository;
use super::selection::SelectionStore;
use crate::error::{Result, SitelineError};

/// Callback invoked once after a successful site switch, so the surrounding
/// application can re-load site-scoped data.
pub type SiteChangedCallback = Arc<dyn Fn(&Site) + Send + Sync>;

/// Resolves the signed-in user's profile and sibling sites, and owns the
/// active site selection.
///
/// `TenantResolver` is responsible for:
/// - Loading the profile linked to an identity
/// - Loading all sites sharing the profile's organization key
/// - Switching the active site (validated against the resolved set)
/// - Restoring the persisted selection on startup
///
/// The active site is a weak reference (identifier) into the resolved set;
/// only the identifier is persisted.
pub struct TenantResolver {
    /// Directory lookup backend for profiles and sites
    directory: Arc<dyn DirectoryRepository>,
    /// Durable storage for the last-chosen site identifier
    selection: Arc<dyn SelectionStore>,
    /// Resolution state of the profile lookup
    profile: Arc<RwLock<ProfileState>>,
    /// Sites sharing the profile's organization key
    sites: Arc<RwLock<Vec<Site>>>,
    /// Identifier of the active site, if one is selected
    active_site_id: Arc<RwLock<Option<String>>>,
    /// Optional hook fired once per successful site switch
    site_changed: Arc<RwLock<Option<SiteChangedCallback>>>,
}

impl TenantResolver {
    /// Creates a new `TenantResolver` with the given backends.
    pub fn new(directory: Arc<dyn DirectoryRepository>, selection: Arc<dyn SelectionStore>) -> Self {
        Self {
            directory,
            selection,
            profile: Arc::new(RwLock::new(ProfileState::NotLoaded)),
            sites: Arc::new(RwLock::new(Vec::new())),
            active_site_id: Arc::new(RwLock::new(None)),
            site_changed: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets the callback fired after a successful site switch.
    pub async fn set_site_changed_callback(&self, callback: SiteChangedCallback) {
        *self.site_changed.write().await = Some(callback);
    }

    /// Resolves the full tenant state for an identity: profile, sibling
    /// sites, and the restored site selection.
    ///
    /// A missing profile resolves to [`ProfileState::NeedsOnboarding`] and is
    /// not an error; site loading is skipped in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory lookup fails. The stored state keeps
    /// whatever was resolved before the failure.
    pub async fn resolve(&self, identity_id: &str) -> Result<ProfileState> {
        let state = self.load_profile(identity_id).await?;

        if let ProfileState::Loaded { profile } = &state {
            self.load_sites(&profile.organization_key).await?;
            self.restore_selection(profile).await;
        }

        Ok(state)
    }

    /// Discards the cached profile and re-resolves the tenant state.
    ///
    /// This is the only path that reloads an already loaded profile.
    pub async fn refresh(&self, identity_id: &str) -> Result<ProfileState> {
        *self.profile.write().await = ProfileState::NotLoaded;
        self.resolve(identity_id).await
    }

    /// Loads the profile linked to an identity.
    pub async fn load_profile(&self, identity_id: &str) -> Result<ProfileState> {
        let state = match self.directory.find_profile(identity_id).await? {
            Some(profile) => ProfileState::Loaded { profile },
            None => {
                tracing::info!(target: "tenant", identity_id, "no linked profile, onboarding required");
                ProfileState::NeedsOnboarding
            }
        };

        *self.profile.write().await = state.clone();
        Ok(state)
    }

    /// Loads all sites sharing the given organization key.
    pub async fn load_sites(&self, organization_key: &str) -> Result<Vec<Site>> {
        let sites = self.directory.list_sites(organization_key).await?;
        tracing::debug!(target: "tenant", organization_key, count = sites.len(), "resolved site set");

        *self.sites.write().await = sites.clone();
        Ok(sites)
    }

    /// Switches the active site.
    ///
    /// The identifier must be a member of the resolved site set. On success
    /// the identifier is persisted and the site-changed callback fires once.
    /// Selecting the already active site is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SitelineError::NotFound`] if the identifier is not in the
    /// resolved set; the active site is left unchanged.
    pub async fn select_site(&self, site_id: &str) -> Result<Site> {
        let site = {
            let sites = self.sites.read().await;
            sites
                .iter()
                .find(|s| s.site_id == site_id)
                .cloned()
                .ok_or_else(|| SitelineError::not_found("site", site_id))?
        };

        if self.active_site_id.read().await.as_deref() == Some(site_id) {
            tracing::debug!(target: "tenant", site_id, "site already active");
            return Ok(site);
        }

        self.selection.set(site_id).await?;
        *self.active_site_id.write().await = Some(site_id.to_string());
        tracing::info!(target: "tenant", site_id, "active site switched");

        if let Some(callback) = self.site_changed.read().await.as_ref() {
            callback(&site);
        }

        Ok(site)
    }

    /// Restores the active site after the site set has been resolved.
    ///
    /// Precedence: the persisted identifier if it is still a member of the
    /// resolved set, else the profile's linked site, else the site flagged
    /// primary, else the first resolved site. Only in-memory state changes;
    /// the persisted selection is written exclusively by [`select_site`].
    ///
    /// [`select_site`]: Self::select_site
    pub async fn restore_selection(&self, profile: &Profile) {
        let stored = match self.selection.get().await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(target: "tenant", "selection store read failed: {e}");
                None
            }
        };

        let sites = self.sites.read().await;
        let is_member = |id: &String| sites.iter().any(|s| &s.site_id == id);

        let chosen = stored
            .filter(is_member)
            .or_else(|| profile.linked_site_id.clone().filter(is_member))
            .or_else(|| sites.iter().find(|s| s.is_primary).map(|s| s.site_id.clone()))
            .or_else(|| sites.first().map(|s| s.site_id.clone()));
        drop(sites);

        tracing::debug!(target: "tenant", site_id = ?chosen, "restored site selection");
        *self.active_site_id.write().await = chosen;
    }

    /// Clears the in-memory tenant state: profile first, then the site set
    /// and the active selection.
    pub async fn clear(&self) {
        *self.profile.write().await = ProfileState::NotLoaded;
        self.sites.write().await.clear();
        *self.active_site_id.write().await = None;
    }

    /// Removes the persisted site selection.
    pub async fn clear_persisted(&self) -> Result<()> {
        self.selection.remove().await
    }

    /// Returns the current profile resolution state.
    pub async fn profile_state(&self) -> ProfileState {
        self.profile.read().await.clone()
    }

    /// Returns the resolved site set.
    pub async fn sites(&self) -> Vec<Site> {
        self.sites.read().await.clone()
    }

    /// Returns the identifier of the active site, if any.
    pub async fn active_site_id(&self) -> Option<String> {
        self.active_site_id.read().await.clone()
    }

    /// Returns the active site resolved against the site set.
    pub async fn active_site(&self) -> Option<Site> {
        let id = self.active_site_id.read().await.clone()?;
        self.sites.read().await.iter().find(|s| s.site_id == id).cloned()
    }

    /// Whether more than one sibling site was resolved.
    pub async fn multi_site_active(&self) -> bool {
        self.sites.read().await.len() > 1
    }
}
