// src/session/mod.rs

//! Content-store sessions
//!
//! A session applies a package's content payload to a backing store and
//! reverts it again on uninstall. Plans never touch content directly; they
//! hand the package archive, the effective filter, and a listener to the
//! session attached to the plan.

mod fs;

pub use fs::{FsSession, safe_join, sanitize_path};

use crate::error::Result;
use crate::packages::{ContentEntry, PackageId};
use crate::progress::{ProgressListener, is_descendant_or_equal};
use std::sync::Arc;

/// Content payload of a registered package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentArchive {
    /// Roots the package declares ownership of
    pub roots: Vec<String>,
    pub entries: Vec<ContentEntry>,
}

impl ContentArchive {
    pub fn new(roots: Vec<String>, entries: Vec<ContentEntry>) -> Self {
        Self { roots, entries }
    }

    /// Filter built from the declared roots
    pub fn filter(&self) -> ContentFilter {
        ContentFilter::new(self.roots.clone())
    }
}

/// Backing store for package content
pub trait ContentSession: Send + Sync {
    /// Write every entry accepted by `filter`
    fn apply(
        &self,
        id: &PackageId,
        archive: &ContentArchive,
        filter: &ContentFilter,
        listener: &dyn ProgressListener,
    ) -> Result<()>;

    /// Remove content previously written for `id`
    fn revert(
        &self,
        id: &PackageId,
        archive: &ContentArchive,
        listener: &dyn ProgressListener,
    ) -> Result<()>;
}

/// Shared session handle
pub type SharedSession = Arc<dyn ContentSession>;

/// Set of content roots; `all()` accepts every path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    roots: Option<Vec<String>>,
}

impl ContentFilter {
    /// Filter accepting everything
    pub fn all() -> Self {
        Self { roots: None }
    }

    /// Filter over a list of roots; an empty list accepts everything
    pub fn new<S: Into<String>>(roots: impl IntoIterator<Item = S>) -> Self {
        let roots: Vec<String> = roots
            .into_iter()
            .map(|r| normalize_root(&r.into()))
            .collect();
        if roots.is_empty() {
            Self::all()
        } else {
            Self { roots: Some(roots) }
        }
    }

    pub fn roots(&self) -> Option<&[String]> {
        self.roots.as_deref()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.roots.is_none()
    }

    pub fn accepts(&self, path: &str) -> bool {
        match &self.roots {
            None => true,
            Some(roots) => roots.iter().any(|root| is_descendant_or_equal(root, path)),
        }
    }

    /// Paths accepted by both filters
    ///
    /// The intersection of two disjoint filters accepts nothing.
    pub fn intersect(&self, other: &ContentFilter) -> ContentFilter {
        let (Some(ours), Some(theirs)) = (&self.roots, &other.roots) else {
            return if self.is_unrestricted() {
                other.clone()
            } else {
                self.clone()
            };
        };

        let mut roots = Vec::new();
        for a in ours {
            for b in theirs {
                let narrower = if is_descendant_or_equal(a, b) {
                    b
                } else if is_descendant_or_equal(b, a) {
                    a
                } else {
                    continue;
                };
                if !roots.contains(narrower) {
                    roots.push(narrower.clone());
                }
            }
        }
        ContentFilter { roots: Some(roots) }
    }
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = ContentFilter::new(Vec::<String>::new());
        assert!(filter.is_unrestricted());
        assert!(filter.accepts("/etc/anything"));
    }

    #[test]
    fn test_filter_accepts_descendants() {
        let filter = ContentFilter::new(["/apps/a/"]);
        assert!(filter.accepts("/apps/a"));
        assert!(filter.accepts("/apps/a/config.txt"));
        assert!(!filter.accepts("/apps/ab"));
        assert!(!filter.accepts("/libs/a"));
    }

    #[test]
    fn test_intersect_keeps_narrower_root() {
        let package = ContentFilter::new(["/apps/a"]);
        let caller = ContentFilter::new(["/apps", "/content"]);
        let effective = package.intersect(&caller);
        assert_eq!(effective.roots().unwrap(), ["/apps/a"]);

        let narrow_caller = ContentFilter::new(["/apps/a/conf"]);
        let effective = package.intersect(&narrow_caller);
        assert_eq!(effective.roots().unwrap(), ["/apps/a/conf"]);
    }

    #[test]
    fn test_intersect_disjoint_accepts_nothing() {
        let effective = ContentFilter::new(["/apps"]).intersect(&ContentFilter::new(["/libs"]));
        assert!(!effective.is_unrestricted());
        assert!(!effective.accepts("/apps/x"));
        assert!(!effective.accepts("/libs/x"));
    }

    #[test]
    fn test_intersect_with_unrestricted() {
        let roots = ContentFilter::new(["/apps"]);
        assert_eq!(roots.intersect(&ContentFilter::all()), roots);
        assert_eq!(ContentFilter::all().intersect(&roots), roots);
    }
}
