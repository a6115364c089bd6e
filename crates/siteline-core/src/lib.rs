//! Core domain layer for Siteline.
//!
//! This crate owns the client-side identity and notification synchronization
//! logic: the authentication state machine, multi-site tenant resolution, the
//! merged notification feed, and the realtime badge-count bridge. External
//! collaborators (identity provider, data store queries, push delivery,
//! durable selection storage) are abstracted behind async traits so the
//! surrounding application can inject concrete backends.

pub mod config;
pub mod error;
pub mod identity;
pub mod notification;
pub mod realtime;
pub mod tenant;

// Re-export common error type
pub use error::{Result, SitelineError};
