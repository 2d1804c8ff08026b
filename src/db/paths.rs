// src/db/paths.rs
//! Centralized path derivation for registry directories

use std::path::{Path, PathBuf};

/// Environment variable overriding the registry data directory
pub const DB_DIR_ENV: &str = "PACKREG_DB_DIR";

/// Default catalog location
pub const DEFAULT_DB_PATH: &str = "/var/lib/packreg/registry.db";

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("/var/lib/packreg"))
        .to_path_buf()
}

/// Get the data directory, honoring the env override
pub fn data_dir(db_path: &str) -> PathBuf {
    std::env::var(DB_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| db_dir(db_path))
}

/// Get the default content root for filesystem sessions
pub fn content_dir(db_path: &str) -> PathBuf {
    data_dir(db_path).join("content")
}

/// Get the directory for persisted plans and their journals
pub fn plans_dir(db_path: &str) -> PathBuf {
    data_dir(db_path).join("plans")
}
