//! File-backed site selection store.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use siteline_core::error::Result;
use siteline_core::tenant::SelectionStore;

use crate::dto::SelectionState;
use crate::paths::SitelinePaths;

/// `SelectionStore` implementation persisting to a TOML file.
///
/// The state is cached in memory to avoid repeated file I/O; every mutation
/// writes the full (two-field) document back. Durable across process
/// restarts and scoped to the client device.
#[derive(Clone)]
pub struct FileSelectionStore {
    /// Path of the TOML document
    path: PathBuf,
    /// Cached state loaded from storage
    state: Arc<Mutex<SelectionState>>,
}

impl FileSelectionStore {
    /// Opens the store at the default platform location, creating the file
    /// with an empty selection if it does not exist.
    pub async fn new() -> Result<Self> {
        let paths = SitelinePaths::default();
        paths.ensure_config_dir()?;
        Self::with_path(paths.selection_file()?).await
    }

    /// Opens the store at an explicit path.
    pub async fn with_path(path: PathBuf) -> Result<Self> {
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => toml::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let state = SelectionState::default();
                tokio::fs::write(&path, toml::to_string_pretty(&state)?).await?;
                state
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(state)),
        })
    }

    async fn persist(&self, state: &SelectionState) -> Result<()> {
        let raw = toml::to_string_pretty(state)?;
        tokio::fs::write(&self.path, raw).await?;
        tracing::debug!(target: "selection", path = %self.path.display(), "selection persisted");
        Ok(())
    }
}

#[async_trait::async_trait]
impl SelectionStore for FileSelectionStore {
    async fn get(&self) -> Result<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.active_site_id.clone())
    }

    async fn set(&self, site_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.active_site_id = Some(site_id.to_string());
        self.persist(&state).await
    }

    async fn remove(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.active_site_id = None;
        self.persist(&state).await
    }
}
