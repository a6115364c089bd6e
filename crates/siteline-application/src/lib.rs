//! Application layer for Siteline.
//!
//! This crate wires the core synchronization components into one explicit,
//! once-per-application service object with a documented init/teardown
//! lifecycle.

pub mod context;

pub use context::AppContext;
