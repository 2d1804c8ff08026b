// src/plan/mod.rs

//! Execution plans
//!
//! A plan turns requested operations on package ids into a validated,
//! dependency-ordered task list and runs it against the registry:
//!
//! - `builder`: accumulates tasks and context, validates into a plan
//! - `graph`: cycle detection and task ordering
//! - `execute`: the task state machine
//! - `persist`: the versioned XML plan format
//! - `journal`: crash-safe execution records and recovery
//! - `executor`: background execution on the tokio blocking pool

mod builder;
mod execute;
pub mod executor;
pub mod graph;
pub mod journal;
pub mod persist;

pub use builder::{ExecutionPlanBuilder, PlanConfig, TaskBuilder};
pub use execute::ExecutionPlan;
pub use executor::PlanExecutor;

use crate::error::{Error, Result};
use crate::packages::PackageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Operation requested on a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Apply content and mark the package installed
    Install,
    /// Revert content and clear the installed flag
    Uninstall,
    /// Delete the catalog entry
    Remove,
    /// Apply content without install bookkeeping
    Extract,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [Self::Install, Self::Uninstall, Self::Remove, Self::Extract];

    /// Lower-cased name used in persisted plans
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Remove => "remove",
            Self::Extract => "extract",
        }
    }

    /// Everything but REMOVE needs a content session
    pub fn requires_session(&self) -> bool {
        !matches!(self, Self::Remove)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "install" => Ok(Self::Install),
            "uninstall" => Ok(Self::Uninstall),
            "remove" => Ok(Self::Remove),
            "extract" => Ok(Self::Extract),
            _ => Err(Error::Package(format!("unknown task type '{s}'"))),
        }
    }
}

/// Lifecycle of a task
///
/// States only move forward: NEW -> VALID -> RUNNING -> FINISHED or ERROR.
/// A VALID task may also go straight to ERROR when it is cancelled or
/// blocked by a failed prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    New,
    Valid,
    Running,
    Finished,
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Valid)
                | (Self::Valid, Self::Running)
                | (Self::Valid, Self::Error)
                | (Self::Running, Self::Finished)
                | (Self::Running, Self::Error)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Valid => "valid",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One operation on one package
#[derive(Debug, Clone)]
pub struct PackageTask {
    id: PackageId,
    task_type: TaskType,
    state: TaskState,
    error: Option<Arc<Error>>,
}

impl PackageTask {
    pub fn new(id: PackageId, task_type: TaskType) -> Self {
        Self {
            id,
            task_type,
            state: TaskState::New,
            error: None,
        }
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Error recorded when the task moved to ERROR
    pub fn error(&self) -> Option<&Error> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advance the state; regressions and skips are ignored
    pub(crate) fn advance(&mut self, next: TaskState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn fail(&mut self, error: Error) -> bool {
        if !self.advance(TaskState::Error) {
            return false;
        }
        self.error = Some(Arc::new(error));
        true
    }
}

impl fmt::Display for PackageTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.task_type, self.id, self.state)
    }
}
