//! Tenant domain models.

use serde::{Deserialize, Serialize};

/// The profile linked to an authenticated identity.
///
/// Loaded once per session and invalidated only on an explicit refresh
/// request, never implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique profile identifier
    pub profile_id: String,
    /// Key shared by all sites belonging to one legal identity
    pub organization_key: String,
    /// The site this profile is linked to, if onboarding assigned one
    pub linked_site_id: Option<String>,
    /// Whether the user finished onboarding
    pub onboarding_complete: bool,
    /// Whether the profile is active
    pub is_active: bool,
}

/// One organizational location sharing a legal identity with its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Unique site identifier
    pub site_id: String,
    /// Human-readable site label
    pub label: String,
    /// Whether this is the organization's primary site
    pub is_primary: bool,
}

/// Resolution state of the profile lookup.
///
/// A missing profile is an expected state (the identity exists but has not
/// been onboarded yet), not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProfileState {
    /// No lookup has happened yet for this session.
    NotLoaded,
    /// The identity has no linked profile; onboarding is required.
    NeedsOnboarding,
    /// The profile was found.
    Loaded { profile: Profile },
}

impl ProfileState {
    /// Returns the loaded profile, if any.
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Loaded { profile } => Some(profile),
            _ => None,
        }
    }

    pub fn needs_onboarding(&self) -> bool {
        matches!(self, Self::NeedsOnboarding)
    }
}
