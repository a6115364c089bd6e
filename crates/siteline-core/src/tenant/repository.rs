//! Directory lookup boundary.
//!
//! Defines the interface to the external data store's profile and site
//! queries, decoupling tenant resolution from the specific backend.

use async_trait::async_trait;

use super::model::{Profile, Site};
use crate::error::Result;

/// An abstract repository for profile and site lookups.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Finds the profile linked to an identity.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Profile))`: profile found
    /// - `Ok(None)`: the identity has no linked profile (expected state)
    /// - `Err(_)`: error occurred during retrieval
    async fn find_profile(&self, identity_id: &str) -> Result<Option<Profile>>;

    /// Lists all sites sharing the given organization key.
    async fn list_sites(&self, organization_key: &str) -> Result<Vec<Site>>;
}
