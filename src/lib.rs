// src/lib.rs

//! Packreg content package registry
//!
//! Registers versioned content packages with declared dependencies and
//! executes install, uninstall, remove, and extract requests as validated,
//! dependency-ordered execution plans.
//!
//! # Architecture
//!
//! - Database-first: the catalog lives in SQLite
//! - Plans: requests are validated into an ordered task list that can be
//!   saved, reloaded, executed, and resumed from its journal
//! - Sessions: installed content is applied through a pluggable
//!   [`ContentSession`], filtered by content roots

pub mod db;
mod error;
pub mod packages;
pub mod plan;
pub mod progress;
pub mod registry;
pub mod session;
pub mod version;

pub use error::{Error, Result};
pub use packages::{Dependency, DependencyReport, PackageArtifact, PackageId, RegisteredPackage};
pub use plan::{
    ExecutionPlan, ExecutionPlanBuilder, PackageTask, PlanConfig, PlanExecutor, TaskBuilder,
    TaskState, TaskType,
};
pub use progress::{
    LogListener, ProgressListener, ProgressMode, RecordingListener, ScopeTracker, SilentListener,
};
pub use registry::{PackageRegistry, RegistryConfig};
pub use session::{ContentArchive, ContentFilter, ContentSession, FsSession};
pub use version::{Version, VersionRange};
