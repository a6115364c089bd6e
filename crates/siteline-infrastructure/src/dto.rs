//! Storage DTOs, kept separate from the core domain models.

use serde::{Deserialize, Serialize};

/// On-disk shape of the persisted site selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Identifier of the last-chosen site, if any
    #[serde(default)]
    pub active_site_id: Option<String>,
}
