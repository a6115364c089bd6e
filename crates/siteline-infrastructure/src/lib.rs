//! Infrastructure layer for Siteline.
//!
//! This crate provides concrete storage backends for the boundaries the
//! core crate defines, currently the file-backed site selection store and
//! the path management it relies on.

pub mod dto;
pub mod paths;
pub mod selection_store;

pub use selection_store::FileSelectionStore;
