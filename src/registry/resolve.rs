// src/registry/resolve.rs

//! Memoizing dependency resolution used during plan validation

use super::PackageRegistry;
use crate::error::Result;
use crate::packages::{Dependency, PackageId, RegisteredPackage};
use std::collections::HashMap;
use tracing::debug;

/// Resolves each distinct `(dependency, only_installed)` pair once
pub struct CachingResolver<'a> {
    registry: &'a PackageRegistry,
    resolved: HashMap<(Dependency, bool), Option<PackageId>>,
    packages: HashMap<PackageId, Option<RegisteredPackage>>,
    lookups: usize,
}

impl<'a> CachingResolver<'a> {
    pub fn new(registry: &'a PackageRegistry) -> Self {
        Self {
            registry,
            resolved: HashMap::new(),
            packages: HashMap::new(),
            lookups: 0,
        }
    }

    /// Highest registered match, see [`PackageRegistry::resolve`]
    pub fn resolve(&mut self, dependency: &Dependency, only_installed: bool) -> Result<Option<PackageId>> {
        let key = (dependency.clone(), only_installed);
        if let Some(hit) = self.resolved.get(&key) {
            return Ok(hit.clone());
        }

        self.lookups += 1;
        let found = self.registry.resolve(dependency, only_installed)?;
        debug!(
            "Resolved {} (installed only: {}) -> {}",
            dependency,
            only_installed,
            found.as_ref().map_or_else(|| "none".to_string(), |id| id.to_string())
        );
        self.resolved.insert(key, found.clone());
        Ok(found)
    }

    /// Registered package for `id`, loaded once
    pub fn package(&mut self, id: &PackageId) -> Result<Option<RegisteredPackage>> {
        if let Some(hit) = self.packages.get(id) {
            return Ok(hit.clone());
        }

        self.lookups += 1;
        let package = self.registry.open(id)?;
        self.packages.insert(id.clone(), package.clone());
        Ok(package)
    }

    /// Number of registry queries issued so far
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}
