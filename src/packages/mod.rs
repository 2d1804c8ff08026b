// src/packages/mod.rs

//! Package identity, dependencies, and catalog records
//!
//! A package is identified by a `(group, name, version)` triple. Its string
//! form is `group:name:version`; the trailing `:version` is dropped when the
//! version is empty, and the group may be a `/`-separated path.

pub mod artifact;
mod dependency;
mod metadata;

pub use artifact::{ContentEntry, PackageArtifact};
pub use dependency::Dependency;
pub use metadata::{DependencyReport, PackageMetadata, RegisteredPackage};

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Immutable package identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    group: String,
    name: String,
    version: Version,
}

impl PackageId {
    /// Create a new id, validating group and name
    pub fn new(group: &str, name: &str, version: Version) -> Result<Self> {
        let group = group.trim_matches('/');
        validate_part("group", group, true)?;
        validate_part("name", name, false)?;

        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version,
        })
    }

    /// Parse `group:name[:version]` (or a bare `name`)
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [name] => Self::new("", name, Version::empty()),
            [group, name] => Self::new(group, name, Version::empty()),
            [group, name, version] => Self::new(group, name, Version::parse(version)?),
            _ => Err(Error::Parse(format!("Invalid package id '{s}'"))),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Group as path segments
    pub fn group_segments(&self) -> impl Iterator<Item = &str> {
        self.group.split('/').filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// True if both ids name the same package, possibly in different revisions
    pub fn same_package(&self, other: &PackageId) -> bool {
        self.group == other.group && self.name == other.name
    }
}

fn validate_part(what: &str, value: &str, allow_empty: bool) -> Result<()> {
    if value.is_empty() && !allow_empty {
        return Err(Error::Parse(format!("Package {what} must not be empty")));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ':' | ',' | '[' | ']' | '(' | ')'))
    {
        return Err(Error::Parse(format!(
            "Package {what} '{value}' contains an invalid character"
        )));
    }
    Ok(())
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        if !self.version.is_empty() {
            write!(f, ":{}", self.version)?;
        }
        Ok(())
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.to_string()
    }
}
