// src/db/models/mod.rs

//! Data models for catalog tables
//!
//! Each struct mirrors one table and carries its own insert/query helpers.

mod content;
mod dependency;
mod package_entry;

pub use content::{ContentRow, FilterRoot};
pub use dependency::DependencyRow;
pub use package_entry::PackageEntry;
pub(crate) use package_entry::require_row_id;
