// src/packages/metadata.rs

//! Catalog records: package metadata, install state, and dependency reports

use super::{Dependency, PackageId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Metadata declared by a package artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub id: PackageId,
    pub dependencies: Vec<Dependency>,
}

impl PackageMetadata {
    pub fn new(id: PackageId, dependencies: Vec<Dependency>) -> Self {
        Self { id, dependencies }
    }
}

/// A package as stored in the registry
#[derive(Debug, Clone)]
pub struct RegisteredPackage {
    pub metadata: PackageMetadata,
    pub installed: bool,
    pub registered_at: Option<DateTime<Utc>>,
    pub installed_at: Option<DateTime<Utc>>,
}

impl RegisteredPackage {
    pub fn id(&self) -> &PackageId {
        &self.metadata.id
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.metadata.dependencies
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// Outcome of resolving every dependency of one package
#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub id: PackageId,
    pub resolved: HashMap<Dependency, PackageId>,
    pub unresolved: Vec<Dependency>,
}

impl DependencyReport {
    pub fn new(id: PackageId) -> Self {
        Self {
            id,
            resolved: HashMap::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}
