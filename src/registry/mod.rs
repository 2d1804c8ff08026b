// src/registry/mod.rs

//! Persistent package registry
//!
//! The registry is the single catalog shared by every planner. It maps
//! package ids to their declared metadata, content payload, and install
//! flag. Mutations of one package id serialize on a per-package lock;
//! different ids proceed independently.

mod config;
mod resolve;

pub use config::RegistryConfig;
pub use resolve::CachingResolver;

use crate::db::{
    self,
    models::{ContentRow, DependencyRow, FilterRoot, PackageEntry},
};
use crate::error::{Error, Result};
use crate::packages::{
    Dependency, DependencyReport, PackageArtifact, PackageId, PackageMetadata, RegisteredPackage,
};
use crate::plan::ExecutionPlanBuilder;
use crate::session::ContentArchive;
use parking_lot::{Mutex, ReentrantMutex};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Lock guarding mutations of a single package id
pub type PackageLock = Arc<ReentrantMutex<()>>;

/// Catalog of registered packages
pub struct PackageRegistry {
    conn: Mutex<Connection>,
    locks: Mutex<HashMap<PackageId, PackageLock>>,
    config: RegistryConfig,
}

impl PackageRegistry {
    /// Open (creating if necessary) the registry described by `config`
    pub fn new(config: RegistryConfig) -> Result<Self> {
        db::init(&config.db_path)?;
        let conn = db::open(&config.db_path)?;
        info!("Opened package registry at {}", config.db_path);
        Ok(Self::with_connection(conn, config))
    }

    /// Registry backed by a private in-memory catalog
    pub fn in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        Ok(Self::with_connection(conn, RegistryConfig::new(":memory:")))
    }

    fn with_connection(conn: Connection, config: RegistryConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Lock for mutations of `id`
    ///
    /// The lock is reentrant so a task holding it may still flip the
    /// install flag through the public API.
    pub fn package_lock(&self, id: &PackageId) -> PackageLock {
        self.locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    /// Forget the lock of `id` if nothing outside the map holds it
    pub(crate) fn release_lock(&self, id: &PackageId) {
        let mut locks = self.locks.lock();
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn contains(&self, id: &PackageId) -> Result<bool> {
        let conn = self.conn.lock();
        Ok(PackageEntry::find(&conn, id)?.is_some())
    }

    /// All registered package ids, sorted
    pub fn packages(&self) -> Result<Vec<PackageId>> {
        let conn = self.conn.lock();
        let mut ids = PackageEntry::list_all(&conn)?
            .iter()
            .map(PackageEntry::package_id)
            .collect::<Result<Vec<_>>>()?;
        ids.sort();
        Ok(ids)
    }

    /// Load a registered package, or `None`
    pub fn open(&self, id: &PackageId) -> Result<Option<RegisteredPackage>> {
        let conn = self.conn.lock();
        let Some(entry) = PackageEntry::find(&conn, id)? else {
            return Ok(None);
        };
        Ok(Some(load_package(&conn, &entry)?))
    }

    /// Register a package from a TOML manifest
    ///
    /// The package is stored under the id declared by the manifest. Fails
    /// with `PackageExists` if that id is present and `replace` is false.
    pub fn register(&self, source: impl Read, replace: bool) -> Result<PackageId> {
        let artifact = PackageArtifact::from_reader(source)?;
        self.register_artifact(&artifact, replace)
    }

    /// Register a package from a manifest file
    pub fn register_file(&self, path: &Path, replace: bool) -> Result<PackageId> {
        let artifact = PackageArtifact::from_file(path)?;
        self.register_artifact(&artifact, replace)
    }

    /// Register an already parsed artifact
    pub fn register_artifact(&self, artifact: &PackageArtifact, replace: bool) -> Result<PackageId> {
        let metadata = artifact.metadata()?;
        let id = metadata.id.clone();
        let lock = self.package_lock(&id);
        let _guard = lock.lock();

        let mut conn = self.conn.lock();
        db::transaction(&mut conn, |tx| {
            if let Some(existing) = PackageEntry::find(tx, &id)? {
                if !replace {
                    return Err(Error::PackageExists(id.clone()));
                }
                if let Some(row_id) = existing.id {
                    debug!("Replacing registered package {}", id);
                    PackageEntry::delete(tx, row_id)?;
                }
            }

            let row_id = PackageEntry::new(&id).insert(tx)?;
            for (i, dep) in metadata.dependencies.iter().enumerate() {
                DependencyRow::new(row_id, i as i64, dep).insert(tx)?;
            }
            for (i, root) in artifact.filter.roots.iter().enumerate() {
                FilterRoot::insert(tx, row_id, i as i64, root)?;
            }
            for (i, entry) in artifact.content.iter().enumerate() {
                ContentRow::new(row_id, i as i64, entry).insert(tx)?;
            }
            Ok(())
        })?;

        info!("Registered package {}", id);
        Ok(id)
    }

    /// Delete a catalog entry regardless of its install state
    pub fn remove(&self, id: &PackageId) -> Result<()> {
        {
            let lock = self.package_lock(id);
            let _guard = lock.lock();

            let mut conn = self.conn.lock();
            db::transaction(&mut conn, |tx| {
                let row_id = db::models::require_row_id(tx, id)?;
                PackageEntry::delete(tx, row_id)
            })?;
        }
        self.release_lock(id);

        info!("Removed package {}", id);
        Ok(())
    }

    /// Highest registered version matching `dependency`
    ///
    /// With `only_installed`, only installed packages are eligible. No
    /// match is a normal outcome, not an error.
    pub fn resolve(&self, dependency: &Dependency, only_installed: bool) -> Result<Option<PackageId>> {
        let conn = self.conn.lock();
        let mut best: Option<PackageId> = None;

        for entry in PackageEntry::find_by_name(&conn, &dependency.group, &dependency.name)? {
            if only_installed && !entry.installed {
                continue;
            }
            let id = entry.package_id()?;
            if !dependency.matches(&id) {
                continue;
            }
            if best.as_ref().is_none_or(|b| id.version() > b.version()) {
                best = Some(id);
            }
        }

        Ok(best)
    }

    /// Resolve every direct dependency of `id`
    pub fn analyze_dependencies(&self, id: &PackageId, only_installed: bool) -> Result<DependencyReport> {
        let package = self
            .open(id)?
            .ok_or_else(|| Error::NoSuchPackage(id.clone()))?;

        let mut report = DependencyReport::new(id.clone());
        for dep in package.dependencies() {
            match self.resolve(dep, only_installed)? {
                Some(found) => {
                    report.resolved.insert(dep.clone(), found);
                }
                None => report.unresolved.push(dep.clone()),
            }
        }
        Ok(report)
    }

    /// Registered packages declaring a dependency satisfied by `id`
    pub fn usage(&self, id: &PackageId) -> Result<Vec<PackageId>> {
        let conn = self.conn.lock();
        let mut users = BTreeSet::new();

        for row in DependencyRow::find_dependents(&conn, id.group(), id.name())? {
            if !row.to_dependency()?.matches(id) {
                continue;
            }
            if let Some(entry) = PackageEntry::find_by_row_id(&conn, row.package_id)? {
                users.insert(entry.package_id()?);
            }
        }

        Ok(users.into_iter().collect())
    }

    /// Flip the install flag of a registered package
    pub fn set_installed(&self, id: &PackageId, installed: bool) -> Result<()> {
        let lock = self.package_lock(id);
        let _guard = lock.lock();

        let conn = self.conn.lock();
        let row_id = db::models::require_row_id(&conn, id)?;
        PackageEntry::set_installed(&conn, row_id, installed)?;
        debug!("Set installed={} for {}", installed, id);
        Ok(())
    }

    /// Content payload and declared roots of a package
    pub fn content(&self, id: &PackageId) -> Result<ContentArchive> {
        let conn = self.conn.lock();
        let row_id = db::models::require_row_id(&conn, id)?;
        Ok(ContentArchive::new(
            FilterRoot::find_by_package(&conn, row_id)?,
            ContentRow::find_by_package(&conn, row_id)?,
        ))
    }

    /// Start a new execution plan against this registry
    pub fn create_execution_plan(self: &Arc<Self>) -> ExecutionPlanBuilder {
        ExecutionPlanBuilder::new(Arc::clone(self))
    }
}

fn load_package(conn: &Connection, entry: &PackageEntry) -> Result<RegisteredPackage> {
    let id = entry.package_id()?;
    let dependencies = match entry.id {
        Some(row_id) => DependencyRow::find_by_package(conn, row_id)?
            .iter()
            .map(DependencyRow::to_dependency)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(RegisteredPackage {
        metadata: PackageMetadata::new(id, dependencies),
        installed: entry.installed,
        registered_at: entry.registered_time(),
        installed_at: entry.installed_time(),
    })
}
