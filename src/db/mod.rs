// src/db/mod.rs

//! SQLite-backed package catalog
//!
//! All registry state (metadata, dependencies, content payloads, install
//! flags) lives in one database. Schema evolution goes through `schema`.

pub mod migrations;
pub mod models;
pub mod paths;
pub mod schema;

use crate::error::Result;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::info;

/// Create the database (and its parent directory) and bring the schema up to date
pub fn init(db_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    info!("Initialized package catalog at {}", db_path);
    drop(conn);
    Ok(())
}

/// Open the database, enabling foreign keys and applying pending migrations
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a private in-memory catalog
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    schema::migrate(conn)?;
    Ok(())
}

/// Run `f` inside a transaction, committing only if it succeeds
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
