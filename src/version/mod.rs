// src/version/mod.rs

//! Version handling and range satisfaction for package dependencies
//!
//! Versions are dot-separated sequences of numeric or alphanumeric segments.
//! A trailing qualifier may follow a dash (`1.0-SNAPSHOT`). Ranges use the
//! familiar interval notation: `[1.0,2.0)`, `(1.0,]`, or a bare `1.0` meaning
//! "1.0 or newer".

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A package version
///
/// The original string is kept so that `parse(v.to_string()) == v` holds for
/// every parsed version. The empty version sorts before every other version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    segments: Vec<String>,
}

impl Version {
    /// The empty version
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a version string
    ///
    /// Examples:
    /// - "" → empty version
    /// - "1.2.3" → segments 1, 2, 3
    /// - "1.0-SNAPSHOT" → segments 1, 0, SNAPSHOT
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Ok(Self::empty());
        }

        if raw
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | ',' | '[' | ']' | '(' | ')'))
        {
            return Err(Error::Parse(format!("Invalid character in version '{raw}'")));
        }

        let segments: Vec<String> = raw.split(['.', '-']).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::Parse(format!("Empty segment in version '{raw}'")));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compare two versions segment by segment
    ///
    /// Numeric segments compare numerically, anything else compares as text.
    /// When all shared segments are equal the longer version wins.
    pub fn compare(&self, other: &Version) -> Ordering {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => a.cmp(b),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.raw
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // "1.0" and "1.00" are distinct values; fall back to the raw text so
        // the ordering stays consistent with equality
        self.compare(other).then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version interval with optional inclusive or exclusive bounds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    pub low: Option<Version>,
    pub low_inclusive: bool,
    pub high: Option<Version>,
    pub high_inclusive: bool,
}

impl VersionRange {
    /// The range accepting every version
    pub fn any() -> Self {
        Self::default()
    }

    /// The range `[v,)`: `v` or newer
    pub fn at_least(v: Version) -> Self {
        Self {
            low: Some(v),
            low_inclusive: true,
            high: None,
            high_inclusive: false,
        }
    }

    /// The range `[v,v]`
    pub fn exactly(v: Version) -> Self {
        Self {
            low: Some(v.clone()),
            low_inclusive: true,
            high: Some(v),
            high_inclusive: true,
        }
    }

    /// Parse a range string
    ///
    /// Examples:
    /// - "" → any version
    /// - "1.0" → 1.0 or newer
    /// - "[1.0,2.0)" → 1.0 inclusive up to 2.0 exclusive
    /// - "(,2.0]" → anything up to 2.0 inclusive
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::any());
        }

        let low_inclusive = match s.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Ok(Self::at_least(Version::parse(s)?)),
        };
        let high_inclusive = match s.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => {
                return Err(Error::Parse(format!(
                    "Version range '{s}' must end with ']' or ')'"
                )));
            }
        };

        let inner = &s[1..s.len() - 1];
        let (low, high) = inner.split_once(',').ok_or_else(|| {
            Error::Parse(format!("Version range '{s}' is missing a ','"))
        })?;

        let low = Version::parse(low)?;
        let high = Version::parse(high)?;
        // an unbounded side has no inclusivity
        let low = (!low.is_empty()).then_some(low);
        let high = (!high.is_empty()).then_some(high);
        let range = Self {
            low_inclusive: low_inclusive && low.is_some(),
            low,
            high_inclusive: high_inclusive && high.is_some(),
            high,
        };

        if let (Some(l), Some(h)) = (&range.low, &range.high)
            && l.compare(h) == Ordering::Greater
        {
            return Err(Error::Parse(format!(
                "Version range '{s}' has a lower bound above its upper bound"
            )));
        }

        Ok(range)
    }

    pub fn is_any(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// Check whether a version lies inside this range
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(low) = &self.low {
            match version.compare(low) {
                Ordering::Less => return false,
                Ordering::Equal if !self.low_inclusive => return false,
                _ => {}
            }
        }
        if let Some(high) = &self.high {
            match version.compare(high) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.high_inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return Ok(());
        }
        // bare form for "v or newer"
        if let (Some(low), None, true) = (&self.low, &self.high, self.low_inclusive) {
            return write!(f, "{low}");
        }
        write!(
            f,
            "{}{},{}{}",
            if self.low_inclusive { '[' } else { '(' },
            self.low.as_ref().map(Version::as_str).unwrap_or(""),
            self.high.as_ref().map(Version::as_str).unwrap_or(""),
            if self.high_inclusive { ']' } else { ')' },
        )
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
