// src/db/migrations.rs
//! Catalog migration implementations
//!
//! Each function upgrades the schema by exactly one version.

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

/// Initial schema - Version 1
///
/// - packages: one row per registered (group, name, version) with install state
/// - dependencies: ordered dependency declarations per package
/// - content: ordered content payload entries per package
/// - filter_roots: content roots a package owns
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_name TEXT NOT NULL,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            installed INTEGER NOT NULL DEFAULT 0 CHECK(installed IN (0, 1)),
            registered_at TEXT NOT NULL,
            installed_at TEXT,
            UNIQUE(group_name, name, version)
        );

        CREATE INDEX idx_packages_name ON packages(group_name, name);

        CREATE TABLE dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            dep_group TEXT NOT NULL,
            dep_name TEXT NOT NULL,
            version_range TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_dependencies_package ON dependencies(package_id);
        CREATE INDEX idx_dependencies_target ON dependencies(dep_group, dep_name);

        CREATE TABLE content (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            path TEXT NOT NULL,
            data BLOB NOT NULL,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_content_package ON content(package_id);

        CREATE TABLE filter_roots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            root TEXT NOT NULL,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );
        ",
    )?;

    Ok(())
}
