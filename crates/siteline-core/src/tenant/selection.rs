//! Durable selection storage boundary.

use async_trait::async_trait;

use crate::error::Result;

/// An abstract store for the persisted site selection.
///
/// The store is durable across process restarts and scoped to the client
/// device. It is written only by
/// [`TenantResolver::select_site`](super::TenantResolver::select_site) and
/// cleared on sign-out.
#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// Returns the persisted site identifier, if any.
    async fn get(&self) -> Result<Option<String>>;

    /// Persists the given site identifier.
    async fn set(&self, site_id: &str) -> Result<()>;

    /// Removes the persisted site identifier.
    async fn remove(&self) -> Result<()>;
}
