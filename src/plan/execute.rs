// src/plan/execute.rs

//! Plan execution
//!
//! Tasks run strictly in plan order. A failing task is recorded and
//! execution moves on; later tasks that need the failed one are marked
//! blocked instead of being attempted. Task states only move forward and
//! every change happens under the task-list write lock, so snapshots taken
//! from another thread are always consistent.

use super::builder::{PlanConfig, ValidatedPlan, ensure_session, installed_users};
use super::graph::{DependencyGraph, ScheduleEntry, schedule};
use super::journal::{self, JournalRecord, PlanJournal};
use super::persist::{self, SUPPORTED_VERSION};
use super::{PackageTask, TaskState, TaskType};
use crate::error::{Error, Result};
use crate::packages::PackageId;
use crate::progress::{ProgressListener, ProgressMode, SharedListener, SilentListener};
use crate::registry::{CachingResolver, PackageRegistry};
use crate::session::ContentSession;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct PlanInner {
    id: String,
    registry: Arc<PackageRegistry>,
    config: PlanConfig,
    tasks: RwLock<Vec<PackageTask>>,
    graph: Mutex<DependencyGraph>,
    started: AtomicBool,
    cancel: Arc<AtomicBool>,
}

/// A validated, ordered task list bound to a registry
///
/// Cloning yields another handle to the same plan.
#[derive(Clone)]
pub struct ExecutionPlan {
    inner: Arc<PlanInner>,
}

impl ExecutionPlan {
    pub(crate) fn new(registry: Arc<PackageRegistry>, plan: ValidatedPlan, config: PlanConfig) -> Self {
        let cancel = config.cancel.clone().unwrap_or_default();
        Self {
            inner: Arc::new(PlanInner {
                id: Uuid::new_v4().to_string(),
                registry,
                config,
                tasks: RwLock::new(plan.tasks),
                graph: Mutex::new(plan.graph),
                started: AtomicBool::new(false),
                cancel,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn registry(&self) -> &Arc<PackageRegistry> {
        &self.inner.registry
    }

    /// Consistent copy of the task list
    pub fn tasks(&self) -> Vec<PackageTask> {
        self.inner.tasks.read().clone()
    }

    /// True once execution started and every task reached a terminal state
    pub fn is_executed(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
            && self.inner.tasks.read().iter().all(PackageTask::is_terminal)
    }

    pub fn has_errors(&self) -> bool {
        self.inner
            .tasks
            .read()
            .iter()
            .any(|t| t.state() == TaskState::Error)
    }

    /// Stop starting new tasks; tasks already terminal are left alone
    pub fn abort(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }

    /// Write the current task order in the persisted plan format
    pub fn save(&self, out: impl Write) -> Result<()> {
        let tasks = self.tasks();
        persist::write_plan(
            out,
            SUPPORTED_VERSION,
            tasks.iter().map(|t| (t.id(), t.task_type())),
        )
    }

    /// Run every task in order
    ///
    /// Returns an error only when the plan cannot run at all (missing
    /// session, second execution, journal setup failure). Per-task failures
    /// are recorded on the task; check `has_errors` afterwards.
    pub fn execute(&self) -> Result<()> {
        let inner = &self.inner;
        ensure_session(&inner.config, &self.tasks())?;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Package(format!(
                "plan {} has already been executed",
                inner.id
            )));
        }

        let mut journal = match self.open_journal() {
            Ok(journal) => journal,
            Err(e) => {
                inner.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let listener: SharedListener = inner
            .config
            .listener
            .clone()
            .unwrap_or_else(|| Arc::new(SilentListener));
        let started = Instant::now();
        info!("Executing plan {} ({} task(s))", inner.id, inner.tasks.read().len());

        let mut index = 0;
        while let Some(task) = self.task_at(index) {
            if task.is_terminal() {
                index += 1;
                continue;
            }

            if self.is_aborted() {
                let error = Error::Cancelled(format!("plan {} aborted", inner.id));
                self.update(index, TaskState::Error, Some(error), &mut journal);
                index += 1;
                continue;
            }

            if let Some(failed) = self.failed_prerequisite(index, &task) {
                let error = Error::DependencyFailed {
                    package: task.id().clone(),
                    failed,
                };
                self.update(index, TaskState::Error, Some(error), &mut journal);
                index += 1;
                continue;
            }

            if task.task_type() == TaskType::Uninstall {
                match self.insert_cascade(index, task.id()) {
                    // Run the inserted dependents first
                    Ok(added) if added > 0 => continue,
                    Ok(_) => {}
                    Err(e) => {
                        self.update(index, TaskState::Error, Some(e), &mut journal);
                        index += 1;
                        continue;
                    }
                }
            }

            self.update(index, TaskState::Running, None, &mut journal);
            listener.on_message(
                ProgressMode::Text,
                task.task_type().as_str(),
                &task.id().to_string(),
            );

            let result = {
                let lock = inner.registry.package_lock(task.id());
                let _guard = lock.lock();
                self.run_task(&task, listener.as_ref())
            };
            if task.task_type() == TaskType::Remove && result.is_ok() {
                inner.registry.release_lock(task.id());
            }

            match result {
                Ok(()) => self.update(index, TaskState::Finished, None, &mut journal),
                Err(e) => {
                    warn!("{} of {} failed: {}", task.task_type(), task.id(), e);
                    self.update(index, TaskState::Error, Some(e), &mut journal);
                }
            }
            index += 1;
        }

        let success = !self.has_errors();
        info!(
            "Plan {} finished{}",
            inner.id,
            if success { "" } else { " with errors" }
        );

        if let Some(mut journal) = journal {
            let done = JournalRecord::Done {
                duration_ms: started.elapsed().as_millis() as u64,
                success,
            };
            if let Err(e) = journal.write(&done).and_then(|()| journal.archive()) {
                warn!("Failed to close journal of plan {}: {}", inner.id, e);
            }
        }

        Ok(())
    }

    /// Run `execute` on the tokio blocking pool
    pub async fn execute_async(&self) -> Result<()> {
        let plan = self.clone();
        tokio::task::spawn_blocking(move || plan.execute())
            .await
            .map_err(|e| Error::Package(format!("plan worker failed: {e}")))?
    }

    fn task_at(&self, index: usize) -> Option<PackageTask> {
        self.inner.tasks.read().get(index).cloned()
    }

    /// Write the plan file and start the journal, if a directory is configured
    fn open_journal(&self) -> Result<Option<PlanJournal>> {
        let Some(dir) = &self.inner.config.journal_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;

        let tasks = self.tasks();
        let file = File::create(journal::plan_path(dir, &self.inner.id))?;
        persist::write_plan(
            BufWriter::new(file),
            SUPPORTED_VERSION,
            tasks.iter().map(|t| (t.id(), t.task_type())),
        )?;

        let mut journal = PlanJournal::create(dir, &self.inner.id)?;
        journal.write(&JournalRecord::Begin {
            plan_id: self.inner.id.clone(),
            task_count: tasks.len(),
            timestamp: Utc::now(),
        })?;
        Ok(Some(journal))
    }

    fn update(
        &self,
        index: usize,
        next: TaskState,
        error: Option<Error>,
        journal: &mut Option<PlanJournal>,
    ) {
        let record = {
            let mut tasks = self.inner.tasks.write();
            let Some(task) = tasks.get_mut(index) else {
                return;
            };
            let changed = match error {
                Some(e) => task.fail(e),
                None => task.advance(next),
            };
            if !changed {
                return;
            }
            info!("{} {} -> {}", task.task_type(), task.id(), task.state());
            JournalRecord::Task {
                index,
                package: task.id().clone(),
                cmd: task.task_type(),
                state: task.state(),
                error: task.error().map(|e| e.to_string()),
            }
        };

        if let Some(journal) = journal.as_mut()
            && let Err(e) = journal.write(&record)
        {
            warn!("Failed to write journal record: {}", e);
        }
    }

    /// Earlier failed task this one cannot run without
    ///
    /// An install needs every package it depends on; an uninstall must wait
    /// for every package depending on it.
    fn failed_prerequisite(&self, index: usize, task: &PackageTask) -> Option<PackageId> {
        let kind = task.task_type();
        if !matches!(kind, TaskType::Install | TaskType::Uninstall) {
            return None;
        }

        let tasks = self.inner.tasks.read();
        let graph = self.inner.graph.lock();
        let node = graph.node(task.id())?;
        let reach = graph.reachable(node);

        tasks[..index]
            .iter()
            .filter(|t| t.task_type() == kind && t.state() == TaskState::Error && t.id() != task.id())
            .find(|failed| {
                let Some(other) = graph.node(failed.id()) else {
                    return false;
                };
                match kind {
                    TaskType::Install => reach[other],
                    _ => graph.reachable(other)[node],
                }
            })
            .map(|failed| failed.id().clone())
    }

    /// Insert uninstalls for installed dependents that have no task yet
    fn insert_cascade(&self, index: usize, target: &PackageId) -> Result<usize> {
        let registry = &self.inner.registry;
        let mut resolver = CachingResolver::new(registry);
        let edges = installed_users(registry, &mut resolver, target)?;
        if edges.is_empty() {
            return Ok(0);
        }

        let covered: HashSet<PackageId> = self
            .inner
            .tasks
            .read()
            .iter()
            .filter(|t| t.task_type() == TaskType::Uninstall)
            .map(|t| t.id().clone())
            .collect();

        let mut local = DependencyGraph::new();
        let mut extras: Vec<PackageId> = Vec::new();
        {
            let mut graph = self.inner.graph.lock();
            for (user, used) in &edges {
                let (u, t) = (graph.add_node(user), graph.add_node(used));
                graph.add_edge(u, t);
                let (u, t) = (local.add_node(user), local.add_node(used));
                local.add_edge(u, t);
                if !covered.contains(user) && !extras.contains(user) {
                    extras.push(user.clone());
                }
            }
        }
        if extras.is_empty() {
            return Ok(0);
        }

        let entries: Vec<ScheduleEntry> = extras
            .iter()
            .enumerate()
            .map(|(i, id)| ScheduleEntry {
                key: (i, 0),
                kind: TaskType::Uninstall,
                node: local.add_node(id),
            })
            .collect();
        let inserted: Vec<PackageTask> = schedule(&local, &entries)
            .into_iter()
            .map(|i| {
                let mut task = PackageTask::new(extras[i].clone(), TaskType::Uninstall);
                task.advance(TaskState::Valid);
                task
            })
            .collect();

        info!(
            "Uninstall of {} cascades to {} installed dependent(s)",
            target,
            inserted.len()
        );
        let added = inserted.len();
        self.inner.tasks.write().splice(index..index, inserted);
        Ok(added)
    }

    fn run_task(&self, task: &PackageTask, listener: &dyn ProgressListener) -> Result<()> {
        let registry = &self.inner.registry;
        let id = task.id();

        match task.task_type() {
            TaskType::Install => {
                let session = self.session()?;
                let archive = registry.content(id)?;
                let filter = archive.filter().intersect(&self.inner.config.filter);
                session.apply(id, &archive, &filter, listener)?;
                registry.set_installed(id, true)
            }
            TaskType::Uninstall => {
                let session = self.session()?;
                let package = registry
                    .open(id)?
                    .ok_or_else(|| Error::NoSuchPackage(id.clone()))?;
                if !package.is_installed() {
                    debug!("{} is not installed, nothing to uninstall", id);
                    return Ok(());
                }
                let archive = registry.content(id)?;
                session.revert(id, &archive, listener)?;
                registry.set_installed(id, false)
            }
            TaskType::Remove => registry.remove(id),
            TaskType::Extract => {
                let session = self.session()?;
                let archive = registry.content(id)?;
                let filter = archive.filter().intersect(&self.inner.config.filter);
                session.apply(id, &archive, &filter, listener)
            }
        }
    }

    fn session(&self) -> Result<&dyn ContentSession> {
        self.inner
            .config
            .session
            .as_deref()
            .ok_or_else(|| Error::Package("no session attached to plan".to_string()))
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("id", &self.inner.id)
            .field("tasks", &*self.inner.tasks.read())
            .finish()
    }
}
