//! Tenant domain module.
//!
//! A "site" is one organizational location sharing a legal identity with
//! zero or more sibling locations. This module resolves the signed-in
//! user's profile, the sibling site set, and the active site selection.
//!
//! # Module Structure
//!
//! - `model`: Profile and site domain models (`Profile`, `Site`, `ProfileState`)
//! - `repository`: Directory lookup boundary (`DirectoryRepository`)
//! - `selection`: Durable selection storage boundary (`SelectionStore`)
//! - `resolver`: Resolution and site-switch logic (`TenantResolver`)

mod model;
mod repository;
mod resolver;
mod selection;

// Re-export public API
pub use model::{Profile, ProfileState, Site};
pub use repository::DirectoryRepository;
pub use resolver::{SiteChangedCallback, TenantResolver};
pub use selection::SelectionStore;
