// src/commands/plan.rs
//! Execution plan commands

use super::{open_registry, parse_id};
use anyhow::{Context, Result};
use packreg::plan::journal;
use packreg::{
    ContentFilter, ExecutionPlan, ExecutionPlanBuilder, FsSession, LogListener, PackageRegistry,
    PackageTask, PlanConfig, ScopeTracker, TaskType,
};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Execution context for plans run from the command line
fn plan_config(
    registry: &PackageRegistry,
    root: Option<&str>,
    filters: &[String],
    tracker: &Arc<ScopeTracker>,
) -> Result<PlanConfig> {
    let root = root
        .map(PathBuf::from)
        .unwrap_or_else(|| registry.config().content_root.clone());
    let session = FsSession::new(&root)
        .with_context(|| format!("Failed to open content root {}", root.display()))?;

    Ok(PlanConfig::new()
        .with_session(Arc::new(session))
        .with_listener(tracker.clone())
        .with_filter(ContentFilter::new(filters.iter().cloned()))
        .with_journal_dir(registry.config().plan_dir.clone()))
}

fn print_tasks(tasks: &[PackageTask]) {
    for (i, task) in tasks.iter().enumerate() {
        match task.error() {
            Some(e) => println!("  {:>3}. {} {} [{}] {}", i + 1, task.task_type(), task.id(), task.state(), e),
            None => println!("  {:>3}. {} {} [{}]", i + 1, task.task_type(), task.id(), task.state()),
        }
    }
}

fn execute(plan: &ExecutionPlan, tracker: &ScopeTracker) -> Result<()> {
    plan.execute()?;

    println!("Plan {}:", plan.id());
    print_tasks(&plan.tasks());
    info!(
        "{} path(s) added in application scope, {} elsewhere",
        tracker.matches(),
        tracker.misses()
    );

    if plan.has_errors() {
        return Err(anyhow::anyhow!("Plan {} finished with errors", plan.id()));
    }
    println!("Plan completed successfully");
    Ok(())
}

/// Build, validate, and optionally execute a plan of one task type
pub fn cmd_tasks(
    task_type: TaskType,
    packages: &[String],
    db_path: &str,
    root: Option<&str>,
    filters: &[String],
    dry_run: bool,
) -> Result<()> {
    let registry = open_registry(db_path)?;
    let mut builder = registry.create_execution_plan();
    for package in packages {
        builder.task(parse_id(package)?, task_type);
    }

    if dry_run {
        builder.validate()?;
        println!("Would execute:");
        print_tasks(builder.tasks().unwrap_or_default());
        return Ok(());
    }

    let tracker = Arc::new(ScopeTracker::application_scoped(Some(Arc::new(LogListener))));
    if task_type.requires_session() {
        builder.configure(plan_config(&registry, root, filters, &tracker)?);
    } else {
        builder.configure(PlanConfig::new().with_journal_dir(registry.config().plan_dir.clone()));
    }

    let plan = builder.build()?;
    execute(&plan, &tracker)
}

pub fn cmd_plan_create(
    requests: &[(TaskType, &[String])],
    output: Option<&str>,
    db_path: &str,
) -> Result<()> {
    let registry = open_registry(db_path)?;
    let mut builder = registry.create_execution_plan();
    for (task_type, packages) in requests {
        for package in packages.iter() {
            builder.task(parse_id(package)?, *task_type);
        }
    }
    if builder.is_empty() {
        return Err(anyhow::anyhow!("No tasks requested"));
    }

    match output {
        Some(path) => {
            builder.save_file(Path::new(path))?;
            println!("Wrote plan with {} task(s) to {}", builder.tasks().map_or(0, <[_]>::len), path);
        }
        None => {
            builder.save(BufWriter::new(io::stdout().lock()))?;
        }
    }
    Ok(())
}

fn load(registry: &Arc<PackageRegistry>, file: &str) -> Result<ExecutionPlanBuilder> {
    let mut builder = registry.create_execution_plan();
    builder
        .load_file(Path::new(file))
        .with_context(|| format!("Failed to load plan {file}"))?;
    Ok(builder)
}

pub fn cmd_plan_show(file: &str, db_path: &str) -> Result<()> {
    let registry = open_registry(db_path)?;
    let mut builder = load(&registry, file)?;
    builder.validate()?;

    println!("Plan {} (version {:?}):", file, builder.version());
    print_tasks(builder.tasks().unwrap_or_default());
    Ok(())
}

pub fn cmd_plan_run(file: &str, db_path: &str, root: Option<&str>, filters: &[String]) -> Result<()> {
    let registry = open_registry(db_path)?;
    let mut builder = load(&registry, file)?;

    let tracker = Arc::new(ScopeTracker::application_scoped(Some(Arc::new(LogListener))));
    builder.configure(plan_config(&registry, root, filters, &tracker)?);
    let plan = builder.build()?;
    execute(&plan, &tracker)
}

pub fn cmd_plan_pending(db_path: &str) -> Result<()> {
    let registry = open_registry(db_path)?;
    let dir = &registry.config().plan_dir;
    let pending = journal::pending_plans(dir)?;

    if pending.is_empty() {
        println!("No interrupted plans.");
        return Ok(());
    }

    println!("Interrupted plans:");
    for plan_id in &pending {
        let records = journal::read_records(&journal::journal_path(dir, plan_id))?;
        let finished = journal::finished_tasks(&records).len();
        println!("  {} ({} task(s) finished)", plan_id, finished);
    }
    Ok(())
}

pub fn cmd_plan_recover(plan_id: &str, db_path: &str, root: Option<&str>, dry_run: bool) -> Result<()> {
    let registry = open_registry(db_path)?;
    let dir = registry.config().plan_dir.clone();

    if dry_run {
        let records = journal::read_records(&journal::journal_path(&dir, plan_id))?;
        let finished = journal::finished_tasks(&records);
        let mut builder = load(&registry, &journal::plan_path(&dir, plan_id).to_string_lossy())?;
        builder.validate()?;
        println!("Would resume:");
        let remaining: Vec<PackageTask> = builder
            .tasks()
            .unwrap_or_default()
            .iter()
            .filter(|t| !finished.contains(&(t.id().clone(), t.task_type())))
            .cloned()
            .collect();
        print_tasks(&remaining);
        return Ok(());
    }

    let mut builder = journal::recover(&dir, plan_id, &registry)?;
    if builder.is_empty() {
        warn!("Plan {} had no unfinished tasks", plan_id);
        journal::archive_recovered(&dir, plan_id)?;
        println!("Nothing to resume");
        return Ok(());
    }

    let tracker = Arc::new(ScopeTracker::application_scoped(Some(Arc::new(LogListener))));
    builder.configure(plan_config(&registry, root, &[], &tracker)?);
    let plan = builder.build()?;
    journal::archive_recovered(&dir, plan_id)?;
    execute(&plan, &tracker)
}
