// src/plan/builder.rs

//! Plan construction and validation

use super::graph::{DependencyGraph, ScheduleEntry, schedule};
use super::persist::{self, SUPPORTED_VERSION};
use super::{ExecutionPlan, PackageTask, TaskState, TaskType};
use crate::error::{Error, Result};
use crate::packages::{Dependency, PackageId};
use crate::progress::SharedListener;
use crate::registry::{CachingResolver, PackageRegistry};
use crate::session::{ContentFilter, SharedSession};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::debug;

/// Execution context handed to a plan
#[derive(Clone, Default)]
pub struct PlanConfig {
    /// Content store; required by every task type but REMOVE
    pub session: Option<SharedSession>,
    /// Receives per-path progress; defaults to silence
    pub listener: Option<SharedListener>,
    /// Caller restriction on applied content
    pub filter: ContentFilter,
    /// Cancel token shared with the caller
    pub cancel: Option<Arc<AtomicBool>>,
    /// Where to keep the plan file and execution journal
    pub journal_dir: Option<PathBuf>,
}

impl PlanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: SharedSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_listener(mut self, listener: SharedListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }
}

/// One pending task request; needs both an id and a type
#[derive(Debug, Clone, Default)]
pub struct TaskBuilder {
    id: Option<PackageId>,
    task_type: Option<TaskType>,
}

impl TaskBuilder {
    pub fn with_id(&mut self, id: PackageId) -> &mut Self {
        self.id = Some(id);
        self
    }

    pub fn with_type(&mut self, task_type: TaskType) -> &mut Self {
        self.task_type = Some(task_type);
        self
    }
}

/// Validated task order plus the dependency graph it was derived from
#[derive(Debug, Clone)]
pub(crate) struct ValidatedPlan {
    pub tasks: Vec<PackageTask>,
    pub graph: DependencyGraph,
}

/// Accumulates task requests and turns them into an `ExecutionPlan`
pub struct ExecutionPlanBuilder {
    registry: Arc<PackageRegistry>,
    tasks: Vec<TaskBuilder>,
    config: PlanConfig,
    version: f64,
    plan: Option<ValidatedPlan>,
}

impl ExecutionPlanBuilder {
    pub(crate) fn new(registry: Arc<PackageRegistry>) -> Self {
        Self {
            registry,
            tasks: Vec::new(),
            config: PlanConfig::default(),
            version: SUPPORTED_VERSION,
            plan: None,
        }
    }

    pub fn registry(&self) -> &Arc<PackageRegistry> {
        &self.registry
    }

    /// Start a new task request
    pub fn add_task(&mut self) -> &mut TaskBuilder {
        self.plan = None;
        self.tasks.push(TaskBuilder::default());
        let last = self.tasks.len() - 1;
        &mut self.tasks[last]
    }

    /// Add a complete task request
    pub fn task(&mut self, id: PackageId, task_type: TaskType) -> &mut Self {
        self.add_task().with_id(id).with_type(task_type);
        self
    }

    /// Number of task requests
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn with_session(&mut self, session: SharedSession) -> &mut Self {
        self.config.session = Some(session);
        self
    }

    pub fn with_listener(&mut self, listener: SharedListener) -> &mut Self {
        self.config.listener = Some(listener);
        self
    }

    pub fn with_filter(&mut self, filter: ContentFilter) -> &mut Self {
        self.config.filter = filter;
        self
    }

    /// Replace the whole execution context
    pub fn configure(&mut self, config: PlanConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Format version of the last loaded plan
    pub fn version(&self) -> f64 {
        self.version
    }

    /// Validated tasks in execution order, if `validate` has run
    pub fn tasks(&self) -> Option<&[PackageTask]> {
        self.plan.as_ref().map(|p| p.tasks.as_slice())
    }

    /// Resolve, check, and order the requested tasks
    ///
    /// Fails without side effects if a task is incomplete, references an
    /// unregistered package, needs an unresolvable dependency, or the
    /// induced dependency graph has a cycle.
    pub fn validate(&mut self) -> Result<&mut Self> {
        let requests = self
            .tasks
            .iter()
            .map(|t| match (&t.id, t.task_type) {
                (Some(id), Some(task_type)) => Ok((id.clone(), task_type)),
                _ => Err(Error::Package(
                    "task builder must have package id and type defined".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        self.plan = Some(validate_requests(&self.registry, &requests)?);
        Ok(self)
    }

    /// Validate if needed and bind the plan to the registry and context
    ///
    /// Fails with a package error if a task needs a session and none is
    /// attached.
    pub fn build(&mut self) -> Result<ExecutionPlan> {
        if self.plan.is_none() {
            self.validate()?;
        }
        let plan = self
            .plan
            .clone()
            .ok_or_else(|| Error::Package("plan is not validated".to_string()))?;

        ensure_session(&self.config, &plan.tasks)?;
        Ok(ExecutionPlan::new(
            Arc::clone(&self.registry),
            plan,
            self.config.clone(),
        ))
    }

    /// Write the validated task order
    pub fn save(&mut self, out: impl Write) -> Result<&mut Self> {
        if self.plan.is_none() {
            self.validate()?;
        }
        if let Some(plan) = &self.plan {
            persist::write_plan(
                out,
                self.version,
                plan.tasks.iter().map(|t| (t.id(), t.task_type())),
            )?;
        }
        Ok(self)
    }

    pub fn save_file(&mut self, path: &Path) -> Result<&mut Self> {
        let file = File::create(path)?;
        self.save(BufWriter::new(file))
    }

    /// Replace the pending task requests with a persisted plan
    pub fn load(&mut self, input: impl BufRead) -> Result<&mut Self> {
        let document = persist::read_plan(input)?;
        self.tasks.clear();
        self.plan = None;
        self.version = document.version;
        for (id, task_type) in document.tasks {
            self.task(id, task_type);
        }
        debug!("Loaded plan with {} task(s)", self.tasks.len());
        Ok(self)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<&mut Self> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    /// Drop pending requests matching `predicate`
    pub(crate) fn retain_tasks(&mut self, mut predicate: impl FnMut(&PackageId, TaskType) -> bool) {
        self.tasks.retain(|t| match (&t.id, t.task_type) {
            (Some(id), Some(task_type)) => predicate(id, task_type),
            _ => true,
        });
        self.plan = None;
    }
}

/// Fail if a task needs a session and none is attached
pub(crate) fn ensure_session(config: &PlanConfig, tasks: &[PackageTask]) -> Result<()> {
    if config.session.is_some() {
        return Ok(());
    }
    match tasks.iter().find(|t| t.task_type().requires_session()) {
        Some(task) => Err(Error::Package(format!(
            "{} of {} requires a session",
            task.task_type(),
            task.id()
        ))),
        None => Ok(()),
    }
}

struct Planned {
    id: PackageId,
    task_type: TaskType,
    key: (usize, usize),
}

fn validate_requests(
    registry: &PackageRegistry,
    requests: &[(PackageId, TaskType)],
) -> Result<ValidatedPlan> {
    let mut resolver = CachingResolver::new(registry);
    let mut scheduled: HashSet<(PackageId, TaskType)> = HashSet::new();
    let mut planned: Vec<Planned> = Vec::new();

    for (id, task_type) in requests {
        if !scheduled.insert((id.clone(), *task_type)) {
            debug!("Dropping duplicate {} of {}", task_type, id);
            continue;
        }
        if resolver.package(id)?.is_none() {
            return Err(Error::Package(format!("package {id} is not registered")));
        }
        planned.push(Planned {
            id: id.clone(),
            task_type: *task_type,
            key: (planned.len(), 0),
        });
    }

    let mut graph = DependencyGraph::new();
    let mut seq = 0usize;
    let mut queue: VecDeque<(PackageId, bool, usize)> = VecDeque::new();
    for (anchor, p) in planned.iter().enumerate() {
        graph.add_node(&p.id);
        queue.push_back((p.id.clone(), p.task_type == TaskType::Install, anchor));
    }

    // Installed packages that depend on an uninstall target go with it
    let mut cascaded = Vec::new();
    for (anchor, p) in planned.iter().enumerate() {
        if p.task_type != TaskType::Uninstall {
            continue;
        }
        for (user, used) in installed_users(registry, &mut resolver, &p.id)? {
            let from = graph.add_node(&user);
            let to = graph.add_node(&used);
            graph.add_edge(from, to);
            if scheduled.insert((user.clone(), TaskType::Uninstall)) {
                seq += 1;
                debug!("Cascading uninstall of {} to {}", p.id, user);
                cascaded.push(Planned {
                    id: user.clone(),
                    task_type: TaskType::Uninstall,
                    key: (anchor, seq),
                });
                queue.push_back((user, false, anchor));
            }
        }
    }
    planned.extend(cascaded);

    // Walk dependencies; strict walks come from INSTALL requests
    let mut walked: HashMap<PackageId, bool> = HashMap::new();
    let mut missing: Option<Error> = None;
    while let Some((id, strict, anchor)) = queue.pop_front() {
        match walked.get(&id) {
            Some(&was_strict) if was_strict || !strict => continue,
            _ => {}
        }
        walked.insert(id.clone(), strict);

        let Some(package) = resolver.package(&id)? else {
            continue;
        };
        let from = graph.add_node(&id);

        for dep in package.dependencies() {
            let Some(dep_id) = resolve_dependency(&mut resolver, dep)? else {
                if strict && missing.is_none() {
                    missing = Some(Error::Dependency {
                        dependency: dep.clone(),
                        required_by: id.clone(),
                    });
                }
                debug!("Dependency {} of {} is unresolved", dep, id);
                continue;
            };

            let to = graph.add_node(&dep_id);
            graph.add_edge(from, to);

            // installed dependencies are still walked, only not reinstalled
            let installed = resolver.package(&dep_id)?.is_some_and(|p| p.installed);
            if strict && !installed && scheduled.insert((dep_id.clone(), TaskType::Install)) {
                seq += 1;
                debug!("Adding install of {} required by {}", dep_id, id);
                planned.push(Planned {
                    id: dep_id.clone(),
                    task_type: TaskType::Install,
                    key: (anchor, seq),
                });
            }
            queue.push_back((dep_id, strict, anchor));
        }
    }

    if let Some(cycle) = graph.find_cycle() {
        return Err(Error::CyclicDependency { cycle });
    }
    if let Some(err) = missing {
        return Err(err);
    }

    let entries: Vec<ScheduleEntry> = planned
        .iter()
        .map(|p| ScheduleEntry {
            key: p.key,
            kind: p.task_type,
            node: graph.add_node(&p.id),
        })
        .collect();
    let order = schedule(&graph, &entries);

    let tasks = order
        .into_iter()
        .map(|i| {
            let mut task = PackageTask::new(planned[i].id.clone(), planned[i].task_type);
            task.advance(TaskState::Valid);
            task
        })
        .collect();

    Ok(ValidatedPlan { tasks, graph })
}

/// Installed match first, otherwise the highest registered match
pub(crate) fn resolve_dependency(
    resolver: &mut CachingResolver<'_>,
    dep: &Dependency,
) -> Result<Option<PackageId>> {
    match resolver.resolve(dep, true)? {
        Some(id) => Ok(Some(id)),
        None => resolver.resolve(dep, false),
    }
}

/// Transitive installed users of `target` as `(user, used)` edges
pub(crate) fn installed_users(
    registry: &PackageRegistry,
    resolver: &mut CachingResolver<'_>,
    target: &PackageId,
) -> Result<Vec<(PackageId, PackageId)>> {
    let mut edges = Vec::new();
    let mut seen: HashSet<PackageId> = HashSet::from([target.clone()]);
    let mut stack = vec![target.clone()];

    while let Some(used) = stack.pop() {
        for user in registry.usage(&used)? {
            if !resolver.package(&user)?.is_some_and(|p| p.installed) {
                continue;
            }
            edges.push((user.clone(), used.clone()));
            if seen.insert(user.clone()) {
                stack.push(user);
            }
        }
    }

    Ok(edges)
}
