// tests/recovery.rs

//! Journaled execution, interrupted-plan recovery, cancellation, and
//! background execution.

mod common;

use chrono::Utc;
use common::{id, is_installed, registry_with, setup_file_registry};
use packreg::plan::journal::{self, JournalRecord, PlanJournal};
use packreg::session::ContentArchive;
use packreg::{
    ContentFilter, ContentSession, Error, FsSession, PackageId, PlanConfig, PlanExecutor,
    ProgressListener, Result, TaskState, TaskType,
};
use std::fs;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_completed_plan_is_archived() {
    let (temp, registry) = setup_file_registry();
    let plans = registry.config().plan_dir.clone();
    registry
        .register(common::manifest("g:A:1.0", &[]).as_bytes(), false)
        .unwrap();

    let mut builder = registry.create_execution_plan();
    builder.task(id("g:A:1.0"), TaskType::Install);
    builder.configure(
        PlanConfig::new()
            .with_session(Arc::new(FsSession::new(temp.path().join("content")).unwrap()))
            .with_journal_dir(&plans),
    );
    let plan = builder.build().unwrap();
    plan.execute().unwrap();

    assert!(journal::pending_plans(&plans).unwrap().is_empty());
    let archived = plans.join("archive").join(format!("plan-{}.journal", plan.id()));
    let records = journal::read_records(&archived).unwrap();
    assert!(matches!(records.first(), Some(JournalRecord::Begin { task_count: 1, .. })));
    assert!(matches!(records.last(), Some(JournalRecord::Done { success: true, .. })));
    assert!(plans.join("archive").join(format!("plan-{}.xml", plan.id())).exists());
}

#[test]
fn test_recover_resumes_unfinished_tasks() {
    let (temp, registry) = setup_file_registry();
    let plans = registry.config().plan_dir.clone();
    for (package, deps) in [("g:A:1.0", &["g:B"][..]), ("g:B:1.0", &[][..])] {
        registry
            .register(common::manifest(package, deps).as_bytes(), false)
            .unwrap();
    }

    // A run that finished B, then died while installing A
    fs::create_dir_all(&plans).unwrap();
    registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .save_file(&journal::plan_path(&plans, "crashed"))
        .unwrap();
    let mut interrupted = PlanJournal::create(&plans, "crashed").unwrap();
    interrupted
        .write(&JournalRecord::Begin {
            plan_id: "crashed".into(),
            task_count: 2,
            timestamp: Utc::now(),
        })
        .unwrap();
    for (index, package, state) in [
        (0, "g:B:1.0", TaskState::Running),
        (0, "g:B:1.0", TaskState::Finished),
        (1, "g:A:1.0", TaskState::Running),
    ] {
        interrupted
            .write(&JournalRecord::Task {
                index,
                package: id(package),
                cmd: TaskType::Install,
                state,
                error: None,
            })
            .unwrap();
    }
    registry.set_installed(&id("g:B:1.0"), true).unwrap();
    drop(interrupted);

    assert_eq!(journal::pending_plans(&plans).unwrap(), vec!["crashed".to_string()]);

    let mut builder = journal::recover(&plans, "crashed", &registry).unwrap();
    assert_eq!(builder.len(), 1);
    assert_eq!(journal::pending_plans(&plans).unwrap(), vec!["crashed".to_string()]);

    let plan = builder
        .with_session(Arc::new(FsSession::new(temp.path().join("content")).unwrap()))
        .build()
        .unwrap();
    assert_eq!(plan.tasks().len(), 1);

    journal::archive_recovered(&plans, "crashed").unwrap();
    assert!(journal::pending_plans(&plans).unwrap().is_empty());
    assert!(plans.join("archive/plan-crashed.journal").exists());
    assert!(plans.join("archive/plan-crashed.xml").exists());
    plan.execute().unwrap();

    assert!(is_installed(&registry, "g:A:1.0"));
    assert!(is_installed(&registry, "g:B:1.0"));
}

#[test]
fn test_failed_rebuild_keeps_plan_pending() {
    let (_temp, registry) = setup_file_registry();
    let plans = registry.config().plan_dir.clone();
    for (package, deps) in [("g:A:1.0", &["g:B"][..]), ("g:B:1.0", &[][..])] {
        registry
            .register(common::manifest(package, deps).as_bytes(), false)
            .unwrap();
    }

    fs::create_dir_all(&plans).unwrap();
    registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .save_file(&journal::plan_path(&plans, "crashed"))
        .unwrap();
    let mut interrupted = PlanJournal::create(&plans, "crashed").unwrap();
    interrupted
        .write(&JournalRecord::Begin {
            plan_id: "crashed".into(),
            task_count: 2,
            timestamp: Utc::now(),
        })
        .unwrap();
    drop(interrupted);

    // B disappeared from the catalog while the plan was down
    registry.remove(&id("g:B:1.0")).unwrap();

    let mut builder = journal::recover(&plans, "crashed", &registry).unwrap();
    assert!(matches!(builder.build(), Err(Error::Package(_))));
    assert_eq!(journal::pending_plans(&plans).unwrap(), vec!["crashed".to_string()]);
    assert!(journal::plan_path(&plans, "crashed").exists());

    // Still recoverable once the catalog is fixed
    registry
        .register(common::manifest("g:B:1.0", &[]).as_bytes(), false)
        .unwrap();
    let builder = journal::recover(&plans, "crashed", &registry).unwrap();
    assert_eq!(builder.len(), 2);
}

#[test]
fn test_archive_recovered_unknown_plan() {
    let (_temp, registry) = setup_file_registry();
    let plans = registry.config().plan_dir.clone();
    assert!(matches!(
        journal::archive_recovered(&plans, "missing"),
        Err(Error::Package(_))
    ));
}

#[test]
fn test_recover_unknown_plan() {
    let (_temp, registry) = setup_file_registry();
    let plans = registry.config().plan_dir.clone();
    assert!(matches!(
        journal::recover(&plans, "missing", &registry),
        Err(Error::Package(_))
    ));
}

#[test]
fn test_catalog_survives_reopen() {
    let (temp, registry) = setup_file_registry();
    registry
        .register(common::manifest("g:A:1.0", &[]).as_bytes(), false)
        .unwrap();
    registry.set_installed(&id("g:A:1.0"), true).unwrap();
    let config = registry.config().clone();
    drop(registry);

    let reopened = packreg::PackageRegistry::new(config).unwrap();
    assert!(is_installed(&reopened, "g:A:1.0"));
    drop(temp);
}

/// Session whose `apply` waits until the test releases it
struct GateSession {
    entered: SyncSender<PackageId>,
    release: Mutex<Receiver<()>>,
}

impl ContentSession for GateSession {
    fn apply(
        &self,
        id: &PackageId,
        _archive: &ContentArchive,
        _filter: &ContentFilter,
        _listener: &dyn ProgressListener,
    ) -> Result<()> {
        let _ = self.entered.send(id.clone());
        let _ = self.release.lock().unwrap().recv();
        Ok(())
    }

    fn revert(&self, _id: &PackageId, _archive: &ContentArchive, _listener: &dyn ProgressListener) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_snapshot_and_abort_while_running() {
    let registry = registry_with(&[("g:A:1.0", &["g:B"]), ("g:B:1.0", &[])]);
    let (entered_tx, entered_rx) = mpsc::sync_channel(1);
    let (release_tx, release_rx) = mpsc::sync_channel(1);
    let session = Arc::new(GateSession {
        entered: entered_tx,
        release: Mutex::new(release_rx),
    });

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(session)
        .build()
        .unwrap();

    let worker = {
        let plan = plan.clone();
        thread::spawn(move || plan.execute())
    };

    assert_eq!(entered_rx.recv().unwrap(), id("g:B:1.0"));
    let snapshot = plan.tasks();
    assert_eq!(snapshot[0].state(), TaskState::Running);
    assert_eq!(snapshot[1].state(), TaskState::Valid);
    assert!(!plan.is_executed());

    plan.abort();
    release_tx.send(()).unwrap();
    worker.join().unwrap().unwrap();

    let tasks = plan.tasks();
    assert_eq!(tasks[0].state(), TaskState::Finished);
    assert!(matches!(tasks[1].error(), Some(Error::Cancelled(_))));
    assert!(plan.is_executed());
    assert!(is_installed(&registry, "g:B:1.0"));
    assert!(!is_installed(&registry, "g:A:1.0"));
}

#[tokio::test]
async fn test_executor_runs_plans_in_background() {
    let registry = registry_with(&[("g:A:1.0", &[]), ("g:B:1.0", &[])]);
    let executor = PlanExecutor::current().unwrap();

    let mut ids = Vec::new();
    for package in ["g:A:1.0", "g:B:1.0"] {
        let plan = registry
            .create_execution_plan()
            .task(id(package), TaskType::Remove)
            .build()
            .unwrap();
        ids.push(executor.submit(plan));
    }
    assert_eq!(executor.plans(), ids);

    for plan_id in &ids {
        executor.wait(plan_id).await.unwrap();
        let tasks = executor.snapshot(plan_id).unwrap();
        assert!(tasks.iter().all(|t| t.state() == TaskState::Finished));
        assert!(executor.get(plan_id).unwrap().is_executed());
    }
    assert!(registry.packages().unwrap().is_empty());
}

#[tokio::test]
async fn test_execute_async() {
    let temp = tempfile::tempdir().unwrap();
    let registry = registry_with(&[("g:A:1.0", &[])]);
    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(Arc::new(FsSession::new(temp.path()).unwrap()))
        .build()
        .unwrap();

    plan.execute_async().await.unwrap();
    assert!(plan.is_executed());
    assert!(is_installed(&registry, "g:A:1.0"));
}
