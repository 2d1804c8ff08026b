// src/session/fs.rs

//! Filesystem-backed content session
//!
//! Content paths come from package manifests and are untrusted. Every path
//! is sanitized and joined under the session root so a package can never
//! write outside it.

use super::{ContentArchive, ContentFilter, ContentSession};
use crate::error::{Error, Result};
use crate::packages::PackageId;
use crate::progress::{ACTION_ADD, ACTION_DELETE, ACTION_UPDATE, ProgressListener, ProgressMode};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Sanitize a content path
///
/// Rejects `..` components, skips `.` components, and strips leading
/// slashes so the result is relative. Empty results are rejected.
///
/// # Examples
///
/// ```
/// use packreg::session::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("/apps/a/x").unwrap(), PathBuf::from("apps/a/x"));
/// assert!(sanitize_path("/apps/../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::Prefix(_) | Component::RootDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path_str.to_string())),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!("'{path_str}' is empty after sanitization")));
    }

    Ok(normalized)
}

/// Join a root with an untrusted content path
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path)?);

    // Symlinks inside the root may still point outside it
    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Session writing package content below a directory
#[derive(Debug, Clone)]
pub struct FsSession {
    root: PathBuf,
}

impl FsSession {
    /// Create a session, creating the root directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read back a content path (mostly useful to callers verifying installs)
    pub fn read(&self, path: &str) -> Result<Option<String>> {
        let target = safe_join(&self.root, path)?;
        if !target.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(target)?))
    }

    fn write_entry(&self, path: &str, data: &str) -> Result<&'static str> {
        let target = safe_join(&self.root, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let action = if target.exists() {
            ACTION_UPDATE
        } else {
            ACTION_ADD
        };
        fs::write(&target, data)?;
        Ok(action)
    }

    fn remove_entry(&self, path: &str) -> Result<bool> {
        let target = safe_join(&self.root, path)?;
        if !target.is_file() {
            return Ok(false);
        }
        fs::remove_file(&target)?;
        self.prune_parents(&target);
        Ok(true)
    }

    /// Remove empty directories between `path` and the root
    fn prune_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // Fails on non-empty directories, which ends the walk
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl ContentSession for FsSession {
    fn apply(
        &self,
        id: &PackageId,
        archive: &ContentArchive,
        filter: &ContentFilter,
        listener: &dyn ProgressListener,
    ) -> Result<()> {
        debug!("Applying content of {} under {}", id, self.root.display());
        for entry in &archive.entries {
            if !filter.accepts(&entry.path) {
                debug!("Skipping {} (outside filter)", entry.path);
                continue;
            }
            match self.write_entry(&entry.path, &entry.data) {
                Ok(action) => listener.on_message(ProgressMode::Paths, action, &entry.path),
                Err(e) => {
                    listener.on_error(ProgressMode::Paths, &entry.path, &e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn revert(
        &self,
        id: &PackageId,
        archive: &ContentArchive,
        listener: &dyn ProgressListener,
    ) -> Result<()> {
        debug!("Reverting content of {} under {}", id, self.root.display());
        for entry in archive.entries.iter().rev() {
            match self.remove_entry(&entry.path) {
                Ok(true) => listener.on_message(ProgressMode::Paths, ACTION_DELETE, &entry.path),
                Ok(false) => {}
                Err(e) => {
                    listener.on_error(ProgressMode::Paths, &entry.path, &e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::ContentEntry;
    use crate::progress::RecordingListener;
    use tempfile::TempDir;

    fn archive(entries: &[(&str, &str)]) -> ContentArchive {
        ContentArchive::new(
            vec![],
            entries
                .iter()
                .map(|(p, d)| ContentEntry {
                    path: p.to_string(),
                    data: d.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("apps/./a").unwrap(), PathBuf::from("apps/a"));
        assert!(matches!(
            sanitize_path("apps/../../x"),
            Err(Error::PathTraversal(_))
        ));
        assert!(matches!(sanitize_path("/"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_safe_join_stays_under_root() {
        let root = Path::new("/srv/content");
        assert_eq!(
            safe_join(root, "/apps/a").unwrap(),
            PathBuf::from("/srv/content/apps/a")
        );
        assert!(safe_join(root, "../etc").is_err());
    }

    #[test]
    fn test_apply_and_revert() {
        let temp = TempDir::new().unwrap();
        let session = FsSession::new(temp.path().join("root")).unwrap();
        let listener = RecordingListener::new();
        let id = PackageId::parse("g:a:1.0").unwrap();
        let content = archive(&[("/apps/a/x.txt", "x"), ("/apps/a/deep/y.txt", "y")]);

        session
            .apply(&id, &content, &ContentFilter::all(), &listener)
            .unwrap();
        assert_eq!(session.read("/apps/a/x.txt").unwrap().as_deref(), Some("x"));
        assert_eq!(listener.paths(ACTION_ADD).len(), 2);

        session.apply(&id, &content, &ContentFilter::all(), &listener).unwrap();
        assert_eq!(listener.paths(ACTION_UPDATE).len(), 2);

        session.revert(&id, &content, &listener).unwrap();
        assert_eq!(session.read("/apps/a/x.txt").unwrap(), None);
        assert!(!session.root().join("apps").exists());
        assert!(session.root().exists());
    }

    #[test]
    fn test_apply_honors_filter() {
        let temp = TempDir::new().unwrap();
        let session = FsSession::new(temp.path()).unwrap();
        let listener = RecordingListener::new();
        let id = PackageId::parse("g:a:1.0").unwrap();
        let content = archive(&[("/apps/a/x.txt", "x"), ("/etc/y.txt", "y")]);

        session
            .apply(&id, &content, &ContentFilter::new(["/apps"]), &listener)
            .unwrap();
        assert!(session.read("/apps/a/x.txt").unwrap().is_some());
        assert!(session.read("/etc/y.txt").unwrap().is_none());
    }

    #[test]
    fn test_apply_reports_traversal() {
        let temp = TempDir::new().unwrap();
        let session = FsSession::new(temp.path()).unwrap();
        let listener = RecordingListener::new();
        let id = PackageId::parse("g:evil:1.0").unwrap();

        let result = session.apply(
            &id,
            &archive(&[("/../outside.txt", "x")]),
            &ContentFilter::all(),
            &listener,
        );
        assert!(matches!(result, Err(Error::PathTraversal(_))));
        assert_eq!(listener.error_count(), 1);
    }
}
