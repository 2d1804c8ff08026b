// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use packreg::session::ContentArchive;
use packreg::{
    ContentFilter, ContentSession, Error, FsSession, PackageId, PackageRegistry, ProgressListener,
    RegistryConfig, Result,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

pub fn id(s: &str) -> PackageId {
    PackageId::parse(s).unwrap()
}

/// Manifest for `id` with one content file under `/apps/<name>`
pub fn manifest(id: &str, deps: &[&str]) -> String {
    let id = PackageId::parse(id).unwrap();
    let deps = deps
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[package]\n\
         group = \"{group}\"\n\
         name = \"{name}\"\n\
         version = \"{version}\"\n\
         dependencies = [{deps}]\n\
         \n\
         [[content]]\n\
         path = \"/apps/{name}/{name}.txt\"\n\
         data = \"{name} {version}\"\n",
        group = id.group(),
        name = id.name(),
        version = id.version(),
    )
}

/// In-memory registry populated with `(id, dependencies)` pairs
pub fn registry_with(packages: &[(&str, &[&str])]) -> Arc<PackageRegistry> {
    let registry = Arc::new(PackageRegistry::in_memory().unwrap());
    for (package, deps) in packages {
        registry
            .register(manifest(package, deps).as_bytes(), false)
            .unwrap();
    }
    registry
}

/// Create an on-disk registry inside a temp dir.
///
/// Returns (TempDir, registry) - keep the TempDir alive to prevent cleanup.
pub fn setup_file_registry() -> (TempDir, Arc<PackageRegistry>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("registry.db")
        .to_str()
        .unwrap()
        .to_string();

    let config = RegistryConfig::new(db_path)
        .with_content_root(temp_dir.path().join("content"))
        .with_plan_dir(temp_dir.path().join("plans"));
    let registry = PackageRegistry::new(config).unwrap();
    (temp_dir, Arc::new(registry))
}

pub fn fs_session(temp: &TempDir) -> Arc<FsSession> {
    Arc::new(FsSession::new(temp.path().join("content")).unwrap())
}

pub fn is_installed(registry: &PackageRegistry, package: &str) -> bool {
    registry
        .open(&id(package))
        .unwrap()
        .is_some_and(|p| p.is_installed())
}

/// Session that fails for selected packages and succeeds otherwise
#[derive(Default)]
pub struct FailingSession {
    fail_apply: HashSet<PackageId>,
    fail_revert: HashSet<PackageId>,
}

impl FailingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_apply(mut self, package: &str) -> Self {
        self.fail_apply.insert(id(package));
        self
    }

    pub fn fail_revert(mut self, package: &str) -> Self {
        self.fail_revert.insert(id(package));
        self
    }
}

impl ContentSession for FailingSession {
    fn apply(
        &self,
        id: &PackageId,
        _archive: &ContentArchive,
        _filter: &ContentFilter,
        _listener: &dyn ProgressListener,
    ) -> Result<()> {
        if self.fail_apply.contains(id) {
            return Err(Error::Package(format!("content import of {id} failed")));
        }
        Ok(())
    }

    fn revert(&self, id: &PackageId, _archive: &ContentArchive, _listener: &dyn ProgressListener) -> Result<()> {
        if self.fail_revert.contains(id) {
            return Err(Error::Package(format!("content revert of {id} failed")));
        }
        Ok(())
    }
}
