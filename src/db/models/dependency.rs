// src/db/models/dependency.rs

//! DependencyRow model - ordered dependency declarations of a package

use crate::error::Result;
use crate::packages::Dependency;
use crate::version::VersionRange;
use rusqlite::{Connection, Row, params};

/// A row of the `dependencies` table
#[derive(Debug, Clone)]
pub struct DependencyRow {
    pub id: Option<i64>,
    pub package_id: i64,
    pub position: i64,
    pub dep_group: String,
    pub dep_name: String,
    pub version_range: String,
}

impl DependencyRow {
    pub fn new(package_id: i64, position: i64, dependency: &Dependency) -> Self {
        Self {
            id: None,
            package_id,
            position,
            dep_group: dependency.group.clone(),
            dep_name: dependency.name.clone(),
            version_range: dependency.range.to_string(),
        }
    }

    /// Insert this dependency into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO dependencies (package_id, position, dep_group, dep_name, version_range)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.package_id,
                self.position,
                &self.dep_group,
                &self.dep_name,
                &self.version_range,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all dependencies of a package, in declaration order
    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, position, dep_group, dep_name, version_range
             FROM dependencies WHERE package_id = ?1 ORDER BY position",
        )?;

        let deps = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deps)
    }

    /// Find all declarations naming a (group, name) pair (reverse dependencies)
    pub fn find_dependents(conn: &Connection, group: &str, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, position, dep_group, dep_name, version_range
             FROM dependencies WHERE dep_group = ?1 AND dep_name = ?2",
        )?;

        let deps = stmt
            .query_map([group, name], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deps)
    }

    /// Convert back into a dependency
    pub fn to_dependency(&self) -> Result<Dependency> {
        Ok(Dependency::new(
            &self.dep_group,
            &self.dep_name,
            VersionRange::parse(&self.version_range)?,
        ))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            position: row.get(2)?,
            dep_group: row.get(3)?,
            dep_name: row.get(4)?,
            version_range: row.get(5)?,
        })
    }
}
