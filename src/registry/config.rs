// src/registry/config.rs

//! Registry configuration

use crate::db::paths;
use std::path::PathBuf;

/// Where the registry keeps its catalog, installed content, and plans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// SQLite catalog path
    pub db_path: String,
    /// Root directory of the default filesystem session
    pub content_root: PathBuf,
    /// Directory for persisted plans and execution journals
    pub plan_dir: PathBuf,
}

impl RegistryConfig {
    /// Derive content and plan directories from the database location
    ///
    /// `PACKREG_DB_DIR` overrides the derived data directory.
    pub fn new(db_path: impl Into<String>) -> Self {
        let db_path = db_path.into();
        Self {
            content_root: paths::content_dir(&db_path),
            plan_dir: paths::plans_dir(&db_path),
            db_path,
        }
    }

    pub fn with_content_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.content_root = root.into();
        self
    }

    pub fn with_plan_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plan_dir = dir.into();
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(paths::DEFAULT_DB_PATH)
    }
}
