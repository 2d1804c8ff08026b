// src/packages/artifact.rs

//! Package artifact manifests
//!
//! Registration reads a TOML manifest describing the package, its
//! dependencies, the content roots it owns, and its content payload.

use super::{Dependency, PackageId, PackageMetadata};
use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Root structure of a package manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageArtifact {
    pub package: PackageSection,

    #[serde(default)]
    pub filter: FilterSection,

    #[serde(default)]
    pub content: Vec<ContentEntry>,
}

/// `[package]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    #[serde(default)]
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// `[filter]` table: content roots owned by the package
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSection {
    #[serde(default)]
    pub roots: Vec<String>,
}

/// One `[[content]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub path: String,
    #[serde(default)]
    pub data: String,
}

impl PackageArtifact {
    /// Load an artifact from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load an artifact from any reader
    pub fn from_reader(mut source: impl Read) -> Result<Self> {
        let mut content = String::new();
        source.read_to_string(&mut content)?;
        Self::parse(&content)
    }

    /// Parse an artifact from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let artifact: PackageArtifact = toml::from_str(content)
            .map_err(|e| Error::Parse(format!("Invalid package manifest: {e}")))?;
        artifact.metadata()?;
        Ok(artifact)
    }

    /// The id declared by the manifest
    pub fn id(&self) -> Result<PackageId> {
        PackageId::new(
            &self.package.group,
            &self.package.name,
            Version::parse(&self.package.version)?,
        )
    }

    /// Declared id and dependencies
    pub fn metadata(&self) -> Result<PackageMetadata> {
        let dependencies = self
            .package
            .dependencies
            .iter()
            .map(|d| Dependency::parse(d))
            .collect::<Result<Vec<_>>>()?;
        Ok(PackageMetadata::new(self.id()?, dependencies))
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("Cannot serialize package manifest: {e}")))
    }
}
