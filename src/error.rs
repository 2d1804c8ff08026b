// src/error.rs

//! Error types for the package registry and execution plans

use crate::packages::{Dependency, PackageId};
use thiserror::Error;

/// Errors raised by the registry, the planner, and plan execution
#[derive(Error, Debug)]
pub enum Error {
    /// Registration collided with an existing package and replace was not requested
    #[error("Package {0} already exists")]
    PackageExists(PackageId),

    /// An operation referenced a package that is not registered
    #[error("No such package: {0}")]
    NoSuchPackage(PackageId),

    /// A required dependency cannot be resolved against the registry
    #[error("Unresolved dependency {dependency} required by {required_by}")]
    Dependency {
        dependency: Dependency,
        required_by: PackageId,
    },

    /// The induced dependency graph contains a cycle
    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<PackageId> },

    /// Generic planning error (incomplete task, missing session, bad plan)
    #[error("Package error: {0}")]
    Package(String),

    /// A task was not started because a prerequisite task failed
    #[error("Task for {package} not started: prerequisite {failed} failed")]
    DependencyFailed { package: PackageId, failed: PackageId },

    /// The plan was aborted before the task started
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Malformed id, version, range, or manifest
    #[error("Parse error: {0}")]
    Parse(String),

    /// Content path rejected by the session
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Content path tried to escape the session root
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// I/O error (including persisted-plan parse failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog storage failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    /// True for unresolved and cyclic dependency errors
    pub fn is_dependency_error(&self) -> bool {
        matches!(self, Self::Dependency { .. } | Self::CyclicDependency { .. })
    }

    /// Shorthand for an `InvalidData` I/O error
    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }
}

fn format_cycle(cycle: &[PackageId]) -> String {
    cycle
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
