// src/db/models/package_entry.rs

//! PackageEntry model - one registered package and its install state

use crate::error::{Error, Result};
use crate::packages::PackageId;
use crate::version::Version;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, group_name, name, version, installed, registered_at, installed_at";

/// A row of the `packages` table
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub id: Option<i64>,
    pub group_name: String,
    pub name: String,
    pub version: String,
    pub installed: bool,
    pub registered_at: Option<String>,
    pub installed_at: Option<String>,
}

impl PackageEntry {
    /// Create a new, not yet installed entry for a package id
    pub fn new(package: &PackageId) -> Self {
        Self {
            id: None,
            group_name: package.group().to_string(),
            name: package.name().to_string(),
            version: package.version().to_string(),
            installed: false,
            registered_at: None,
            installed_at: None,
        }
    }

    /// Insert this entry into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let registered_at = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO packages (group_name, name, version, installed, registered_at, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.group_name,
                &self.name,
                &self.version,
                self.installed,
                &registered_at,
                &self.installed_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.registered_at = Some(registered_at);
        Ok(id)
    }

    /// Find the entry for an exact package id
    pub fn find(conn: &Connection, package: &PackageId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM packages WHERE group_name = ?1 AND name = ?2 AND version = ?3"
        ))?;

        let entry = stmt
            .query_row(
                params![package.group(), package.name(), package.version().as_str()],
                Self::from_row,
            )
            .optional()?;

        Ok(entry)
    }

    /// Find every revision of a (group, name) pair
    pub fn find_by_name(conn: &Connection, group: &str, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM packages WHERE group_name = ?1 AND name = ?2"
        ))?;

        let entries = stmt
            .query_map([group, name], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Find an entry by row id
    pub fn find_by_row_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM packages WHERE id = ?1"))?;
        let entry = stmt.query_row([id], Self::from_row).optional()?;
        Ok(entry)
    }

    /// List all entries
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM packages ORDER BY group_name, name, version"
        ))?;

        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Flip the install flag
    pub fn set_installed(conn: &Connection, id: i64, installed: bool) -> Result<()> {
        let installed_at = installed.then(|| Utc::now().to_rfc3339());
        conn.execute(
            "UPDATE packages SET installed = ?1, installed_at = ?2 WHERE id = ?3",
            params![installed, installed_at, id],
        )?;
        Ok(())
    }

    /// Delete an entry; dependent rows cascade
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM packages WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Rebuild the package id stored in this row
    pub fn package_id(&self) -> Result<PackageId> {
        PackageId::new(&self.group_name, &self.name, Version::parse(&self.version)?)
    }

    pub fn registered_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.registered_at.as_deref())
    }

    pub fn installed_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.installed_at.as_deref())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            group_name: row.get(1)?,
            name: row.get(2)?,
            version: row.get(3)?,
            installed: row.get(4)?,
            registered_at: row.get(5)?,
            installed_at: row.get(6)?,
        })
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Row id for a package, or `NoSuchPackage`
pub(crate) fn require_row_id(conn: &Connection, package: &PackageId) -> Result<i64> {
    PackageEntry::find(conn, package)?
        .and_then(|entry| entry.id)
        .ok_or_else(|| Error::NoSuchPackage(package.clone()))
}
