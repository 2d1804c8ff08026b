// src/db/models/content.rs

//! Content payload and filter root rows

use crate::error::Result;
use crate::packages::ContentEntry;
use rusqlite::{Connection, params};

/// A row of the `content` table
#[derive(Debug, Clone)]
pub struct ContentRow {
    pub package_id: i64,
    pub position: i64,
    pub path: String,
    pub data: Vec<u8>,
}

impl ContentRow {
    pub fn new(package_id: i64, position: i64, entry: &ContentEntry) -> Self {
        Self {
            package_id,
            position,
            path: entry.path.clone(),
            data: entry.data.as_bytes().to_vec(),
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO content (package_id, position, path, data) VALUES (?1, ?2, ?3, ?4)",
            params![self.package_id, self.position, &self.path, &self.data],
        )?;
        Ok(())
    }

    /// Load the payload of a package, in declaration order
    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<ContentEntry>> {
        let mut stmt = conn.prepare(
            "SELECT path, data FROM content WHERE package_id = ?1 ORDER BY position",
        )?;

        let entries = stmt
            .query_map([package_id], |row| {
                let data: Vec<u8> = row.get(1)?;
                Ok(ContentEntry {
                    path: row.get(0)?,
                    data: String::from_utf8_lossy(&data).into_owned(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}

/// A row of the `filter_roots` table
#[derive(Debug, Clone)]
pub struct FilterRoot;

impl FilterRoot {
    pub fn insert(conn: &Connection, package_id: i64, position: i64, root: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO filter_roots (package_id, position, root) VALUES (?1, ?2, ?3)",
            params![package_id, position, root],
        )?;
        Ok(())
    }

    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT root FROM filter_roots WHERE package_id = ?1 ORDER BY position")?;

        let roots = stmt
            .query_map([package_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(roots)
    }
}
