//! Identity domain module.
//!
//! This module contains the authenticated session model, the boundary to the
//! external identity provider, and the session lifecycle state machine.
//!
//! # Module Structure
//!
//! - `model`: Session and credential types (`Session`, `Credentials`)
//! - `client`: Identity provider boundary (`IdentityClient`, `AuthEvent`)
//! - `manager`: Session state machine (`SessionManager`, `AuthState`)

mod client;
mod manager;
mod model;

// Re-export public API
pub use client::{AuthEvent, IdentityClient};
pub use manager::{AuthState, CheckOutcome, SessionManager};
pub use model::{Credentials, Session};
