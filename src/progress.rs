// src/progress.rs

//! Progress listeners for content operations
//!
//! Sessions report every path they touch through a `ProgressListener`.
//! Implementations include:
//! - `LogListener`: forwards events to tracing
//! - `SilentListener`: no-op for scripted/quiet modes
//! - `ScopeTracker`: counts added paths inside and outside a set of roots
//! - `RecordingListener`: keeps every event for later inspection

use crate::error::Error;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Path was added
pub const ACTION_ADD: &str = "A";
/// Path was updated in place
pub const ACTION_UPDATE: &str = "U";
/// Path was deleted
pub const ACTION_DELETE: &str = "D";

/// What kind of message a listener receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Free-form status text
    #[default]
    Text,
    /// The `path` argument is a content path
    Paths,
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Paths => write!(f, "paths"),
        }
    }
}

/// Observer for content operations
///
/// Implementations must be thread-safe; plans may execute on a worker thread.
pub trait ProgressListener: Send + Sync {
    /// Called for every step (`action` is a short code such as `A`, `U`, `D`)
    fn on_message(&self, mode: ProgressMode, action: &str, path: &str);

    /// Called when a path could not be processed
    fn on_error(&self, mode: ProgressMode, path: &str, error: &Error);
}

/// Shared listener handle
pub type SharedListener = Arc<dyn ProgressListener>;

/// Forwards progress events to tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl ProgressListener for LogListener {
    fn on_message(&self, mode: ProgressMode, action: &str, path: &str) {
        match mode {
            ProgressMode::Paths => info!("{} {}", action, path),
            ProgressMode::Text => info!("{}", path),
        }
    }

    fn on_error(&self, mode: ProgressMode, path: &str, error: &Error) {
        warn!("{} error at {}: {}", mode, path, error);
    }
}

/// Progress listener that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentListener;

impl ProgressListener for SilentListener {
    fn on_message(&self, _mode: ProgressMode, _action: &str, _path: &str) {}

    fn on_error(&self, _mode: ProgressMode, _path: &str, _error: &Error) {}
}

const APP_ROOTS: &[&str] = &["/apps", "/libs"];

/// Counts added paths that fall inside (matches) or outside (misses) a set of roots
pub struct ScopeTracker {
    base: Option<SharedListener>,
    roots: Vec<String>,
    matches: AtomicU64,
    misses: AtomicU64,
}

impl ScopeTracker {
    pub fn new<S: Into<String>>(roots: impl IntoIterator<Item = S>, base: Option<SharedListener>) -> Self {
        Self {
            base,
            roots: roots.into_iter().map(Into::into).collect(),
            matches: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Tracker scoped to the application roots (`/apps`, `/libs`)
    pub fn application_scoped(base: Option<SharedListener>) -> Self {
        Self::new(APP_ROOTS.iter().copied(), base)
    }

    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn in_scope(&self, path: &str) -> bool {
        self.roots.iter().any(|root| is_descendant_or_equal(root, path))
    }
}

impl ProgressListener for ScopeTracker {
    fn on_message(&self, mode: ProgressMode, action: &str, path: &str) {
        if let Some(base) = &self.base {
            base.on_message(mode, action, path);
        }
        if mode == ProgressMode::Paths && action == ACTION_ADD {
            if self.in_scope(path) {
                self.matches.fetch_add(1, Ordering::Relaxed);
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn on_error(&self, mode: ProgressMode, path: &str, error: &Error) {
        if let Some(base) = &self.base {
            base.on_error(mode, path, error);
        }
    }
}

/// True if `path` equals `root` or lies below it
pub fn is_descendant_or_equal(root: &str, path: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return true;
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// One captured listener event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Message {
        mode: ProgressMode,
        action: String,
        path: String,
    },
    Error {
        mode: ProgressMode,
        path: String,
        error: String,
    },
}

/// Listener that records every event
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Paths reported with the given action
    pub fn paths(&self, action: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Message {
                    mode: ProgressMode::Paths,
                    action: a,
                    path,
                } if a == action => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Error { .. }))
            .count()
    }
}

impl ProgressListener for RecordingListener {
    fn on_message(&self, mode: ProgressMode, action: &str, path: &str) {
        self.events.lock().push(ProgressEvent::Message {
            mode,
            action: action.to_string(),
            path: path.to_string(),
        });
    }

    fn on_error(&self, mode: ProgressMode, path: &str, error: &Error) {
        self.events.lock().push(ProgressEvent::Error {
            mode,
            path: path.to_string(),
            error: error.to_string(),
        });
    }
}
