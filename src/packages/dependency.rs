// src/packages/dependency.rs

//! Dependency declarations between packages

use super::PackageId;
use crate::error::{Error, Result};
use crate::version::VersionRange;
use std::fmt;
use std::str::FromStr;

/// A constraint on another package: `group:name[:range]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub group: String,
    pub name: String,
    pub range: VersionRange,
}

impl Dependency {
    pub fn new(group: &str, name: &str, range: VersionRange) -> Self {
        Self {
            group: group.trim_matches('/').to_string(),
            name: name.to_string(),
            range,
        }
    }

    /// Parse a single dependency
    ///
    /// Examples:
    /// - "g:B" → any version of g:B
    /// - "g:C:[1.0,2.0)" → g:C from 1.0 up to, not including, 2.0
    /// - "g:D:1.2" → g:D 1.2 or newer
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut parts = s.splitn(3, ':');
        let group = parts.next().unwrap_or_default();
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Parse(format!("Dependency '{s}' has no package name")))?;
        let range = match parts.next() {
            Some(r) => VersionRange::parse(r)?,
            None => VersionRange::any(),
        };

        Ok(Self::new(group, name, range))
    }

    /// Parse a comma separated list, keeping commas inside range brackets
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        let mut deps = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;

        for (i, c) in s.char_indices() {
            match c {
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    push_nonempty(&mut deps, &s[start..i])?;
                    start = i + 1;
                }
                _ => {}
            }
        }
        push_nonempty(&mut deps, &s[start..])?;

        Ok(deps)
    }

    /// True if `id` names this package and its version lies in range
    pub fn matches(&self, id: &PackageId) -> bool {
        id.group() == self.group && id.name() == self.name && self.range.contains(id.version())
    }
}

fn push_nonempty(deps: &mut Vec<Dependency>, part: &str) -> Result<()> {
    if !part.trim().is_empty() {
        deps.push(Dependency::parse(part)?);
    }
    Ok(())
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        if !self.range.is_any() {
            write!(f, ":{}", self.range)?;
        }
        Ok(())
    }
}

impl FromStr for Dependency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
