// tests/execution_plan.rs

//! Plan validation, ordering, persistence, and execution against a registry.

mod common;

use common::{FailingSession, fs_session, id, is_installed, registry_with};
use packreg::{Error, PackageTask, PlanConfig, TaskState, TaskType};
use std::sync::Arc;
use tempfile::TempDir;

fn order(tasks: &[PackageTask]) -> Vec<String> {
    tasks
        .iter()
        .map(|t| format!("{} {}", t.task_type(), t.id()))
        .collect()
}

#[test]
fn test_single_install_marks_package_installed() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&[("g:solo:1.0", &[])]);

    let mut builder = registry.create_execution_plan();
    builder.task(id("g:solo:1.0"), TaskType::Install);
    builder.validate().unwrap();
    assert_eq!(builder.tasks().unwrap()[0].state(), TaskState::Valid);

    let plan = builder.with_session(fs_session(&temp)).build().unwrap();
    plan.execute().unwrap();

    assert!(plan.is_executed());
    assert!(!plan.has_errors());
    assert!(is_installed(&registry, "g:solo:1.0"));
    assert!(temp.path().join("content/apps/solo/solo.txt").exists());
}

#[test]
fn test_transitive_install_orders_dependencies_first() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&[
        ("g:A:1.0", &["g:B", "g:C"]),
        ("g:B:1.0", &["g:C"]),
        ("g:C:1.0", &[]),
    ]);

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(fs_session(&temp))
        .build()
        .unwrap();
    assert_eq!(
        order(&plan.tasks()),
        vec!["install g:C:1.0", "install g:B:1.0", "install g:A:1.0"]
    );

    plan.execute().unwrap();
    for package in ["g:A:1.0", "g:B:1.0", "g:C:1.0"] {
        assert!(is_installed(&registry, package), "{package} not installed");
    }
}

#[test]
fn test_submission_order_does_not_change_installed_set() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&[
        ("g:A:1.0", &["g:B", "g:C"]),
        ("g:B:1.0", &["g:C"]),
        ("g:C:1.0", &[]),
    ]);

    let plan = registry
        .create_execution_plan()
        .task(id("g:C:1.0"), TaskType::Install)
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(fs_session(&temp))
        .build()
        .unwrap();
    assert_eq!(plan.tasks().len(), 3);
    assert_eq!(plan.tasks()[0].id(), &id("g:C:1.0"));

    plan.execute().unwrap();
    for package in ["g:A:1.0", "g:B:1.0", "g:C:1.0"] {
        assert!(is_installed(&registry, package));
    }
}

#[test]
fn test_cycle_is_rejected_for_any_plan_touching_it() {
    let registry = registry_with(&[("g:D:1.0", &["g:B", "g:E"]), ("g:E:1.0", &["g:D"])]);

    for (package, task_type) in [
        ("g:D:1.0", TaskType::Install),
        ("g:E:1.0", TaskType::Install),
        ("g:E:1.0", TaskType::Extract),
        ("g:D:1.0", TaskType::Remove),
    ] {
        let err = registry
            .create_execution_plan()
            .task(id(package), task_type)
            .validate()
            .map(|_| ())
            .unwrap_err();
        match &err {
            Error::CyclicDependency { cycle } => {
                assert!(cycle.contains(&id("g:D:1.0")));
                assert!(cycle.contains(&id("g:E:1.0")));
            }
            other => panic!("expected cycle for {task_type} {package}, got {other:?}"),
        }
        assert!(err.is_dependency_error());
    }
}

#[test]
fn test_missing_dependency_is_rejected() {
    let registry = registry_with(&[("g:B:1.0", &["g:C"])]);

    let err = registry
        .create_execution_plan()
        .task(id("g:B:1.0"), TaskType::Install)
        .validate()
        .map(|_| ())
        .unwrap_err();
    match err {
        Error::Dependency {
            dependency,
            required_by,
        } => {
            assert_eq!(dependency.to_string(), "g:C");
            assert_eq!(required_by, id("g:B:1.0"));
        }
        other => panic!("expected dependency error, got {other:?}"),
    }
}

#[test]
fn test_incomplete_task_is_rejected_for_every_type() {
    let registry = registry_with(&[("g:A:1.0", &[])]);

    for task_type in TaskType::ALL {
        let mut builder = registry.create_execution_plan();
        builder.add_task().with_type(task_type);
        assert!(matches!(builder.validate(), Err(Error::Package(_))));

        let mut builder = registry.create_execution_plan();
        builder.add_task().with_id(id("g:A:1.0"));
        assert!(matches!(builder.validate(), Err(Error::Package(_))));
    }
}

#[test]
fn test_unregistered_package_never_validates() {
    let registry = registry_with(&[]);
    for task_type in TaskType::ALL {
        let result = registry
            .create_execution_plan()
            .task(id("g:ghost:1.0"), task_type)
            .validate()
            .map(|_| ());
        assert!(matches!(result, Err(Error::Package(_))));
    }
}

#[test]
fn test_session_required_except_for_remove() {
    let registry = registry_with(&[("g:A:1.0", &[])]);

    for task_type in [TaskType::Install, TaskType::Uninstall, TaskType::Extract] {
        let mut builder = registry.create_execution_plan();
        builder.task(id("g:A:1.0"), task_type);
        builder.validate().unwrap();
        assert!(matches!(builder.build(), Err(Error::Package(_))));
    }

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Remove)
        .build()
        .unwrap();
    plan.execute().unwrap();
    assert!(!plan.has_errors());
    assert!(!registry.contains(&id("g:A:1.0")).unwrap());
}

#[test]
fn test_uninstall_cascades_to_installed_dependents() {
    let temp = TempDir::new().unwrap();
    let session = fs_session(&temp);
    let registry = registry_with(&[
        ("g:A:1.0", &["g:B"]),
        ("g:B:1.0", &["g:C"]),
        ("g:C:1.0", &[]),
        ("g:other:1.0", &[]),
    ]);

    registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .task(id("g:other:1.0"), TaskType::Install)
        .with_session(session.clone())
        .build()
        .unwrap()
        .execute()
        .unwrap();

    let plan = registry
        .create_execution_plan()
        .task(id("g:C:1.0"), TaskType::Uninstall)
        .with_session(session.clone())
        .build()
        .unwrap();
    assert_eq!(
        order(&plan.tasks()),
        vec!["uninstall g:A:1.0", "uninstall g:B:1.0", "uninstall g:C:1.0"]
    );

    plan.execute().unwrap();
    assert!(!plan.has_errors());
    for package in ["g:A:1.0", "g:B:1.0", "g:C:1.0"] {
        assert!(!is_installed(&registry, package), "{package} still installed");
    }
    assert!(is_installed(&registry, "g:other:1.0"));
    assert!(session.read("/apps/A/A.txt").unwrap().is_none());
    assert!(session.read("/apps/other/other.txt").unwrap().is_some());
}

#[test]
fn test_save_load_save_is_idempotent() {
    let registry = Arc::new(packreg::PackageRegistry::in_memory().unwrap());
    registry
        .register(
            "[package]\ngroup = \"my_packages\"\nname = \"tmp\"\n".as_bytes(),
            false,
        )
        .unwrap();
    let tmp = id("my_packages:tmp");

    let mut builder = registry.create_execution_plan();
    builder
        .task(tmp.clone(), TaskType::Extract)
        .task(tmp.clone(), TaskType::Install)
        .task(tmp.clone(), TaskType::Remove)
        .task(tmp.clone(), TaskType::Uninstall);
    let mut first = Vec::new();
    builder.save(&mut first).unwrap();

    let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <executionPlan version=\"1.0\">\n    \
        <task cmd=\"extract\" packageId=\"my_packages:tmp\"/>\n    \
        <task cmd=\"install\" packageId=\"my_packages:tmp\"/>\n    \
        <task cmd=\"remove\" packageId=\"my_packages:tmp\"/>\n    \
        <task cmd=\"uninstall\" packageId=\"my_packages:tmp\"/>\n\
        </executionPlan>\n";
    assert_eq!(String::from_utf8(first.clone()).unwrap(), expected);

    let mut reloaded = registry.create_execution_plan();
    reloaded.load(first.as_slice()).unwrap();
    let mut second = Vec::new();
    reloaded.save(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_saved_order_is_the_validated_order() {
    let registry = registry_with(&[("g:A:1.0", &["g:B"]), ("g:B:1.0", &[])]);

    let mut out = Vec::new();
    registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .save(&mut out)
        .unwrap();
    let text = String::from_utf8(out).unwrap();

    let b = text.find("packageId=\"g:B:1.0\"").unwrap();
    let a = text.find("packageId=\"g:A:1.0\"").unwrap();
    assert!(b < a);
}

#[test]
fn test_load_rejects_newer_format_version() {
    let registry = registry_with(&[]);
    let mut builder = registry.create_execution_plan();
    let err = builder
        .load("<executionPlan version=\"2.0\"/>".as_bytes())
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_end_to_end_with_version_ranges() {
    let temp = TempDir::new().unwrap();
    let registry = registry_with(&[
        ("g:A:1.0", &["g:B", "g:C:[1.0,2.0)"]),
        ("g:B:1.0", &["g:C"]),
        ("g:C:1.0", &[]),
    ]);

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(fs_session(&temp))
        .build()
        .unwrap();
    plan.execute().unwrap();

    assert!(plan.is_executed());
    for package in ["g:A:1.0", "g:B:1.0", "g:C:1.0"] {
        assert!(is_installed(&registry, package));
    }
}

#[test]
fn test_installed_dependency_is_not_reinstalled() {
    let temp = TempDir::new().unwrap();
    let session = fs_session(&temp);
    let registry = registry_with(&[("g:A:1.0", &["g:B"]), ("g:B:1.0", &[])]);

    registry
        .create_execution_plan()
        .task(id("g:B:1.0"), TaskType::Install)
        .with_session(session.clone())
        .build()
        .unwrap()
        .execute()
        .unwrap();

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(session)
        .build()
        .unwrap();
    assert_eq!(order(&plan.tasks()), vec!["install g:A:1.0"]);
}

#[test]
fn test_failed_install_blocks_dependents_only() {
    let registry = registry_with(&[
        ("g:A:1.0", &["g:B"]),
        ("g:B:1.0", &["g:C"]),
        ("g:C:1.0", &[]),
        ("g:D:1.0", &[]),
    ]);
    let session = Arc::new(FailingSession::new().fail_apply("g:C:1.0"));

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .task(id("g:D:1.0"), TaskType::Install)
        .with_session(session)
        .build()
        .unwrap();
    plan.execute().unwrap();

    assert!(plan.is_executed());
    assert!(plan.has_errors());

    let tasks = plan.tasks();
    let state = |package: &str| {
        tasks
            .iter()
            .find(|t| t.id() == &id(package))
            .map(|t| (t.state(), t.error().map(|e| e.to_string())))
            .unwrap()
    };
    assert_eq!(state("g:C:1.0").0, TaskState::Error);
    assert_eq!(state("g:D:1.0").0, TaskState::Finished);

    for blocked in ["g:B:1.0", "g:A:1.0"] {
        let task = tasks.iter().find(|t| t.id() == &id(blocked)).unwrap();
        assert!(matches!(
            task.error(),
            Some(Error::DependencyFailed { failed, .. }) if failed == &id("g:C:1.0") || failed == &id("g:B:1.0")
        ));
        assert!(!is_installed(&registry, blocked));
    }
    assert!(is_installed(&registry, "g:D:1.0"));
}

#[test]
fn test_failed_uninstall_blocks_its_dependencies() {
    let registry = registry_with(&[("g:A:1.0", &["g:B"]), ("g:B:1.0", &[])]);
    let session = Arc::new(FailingSession::new().fail_revert("g:A:1.0"));

    registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Install)
        .with_session(session.clone())
        .build()
        .unwrap()
        .execute()
        .unwrap();

    let plan = registry
        .create_execution_plan()
        .task(id("g:B:1.0"), TaskType::Uninstall)
        .with_session(session)
        .build()
        .unwrap();
    plan.execute().unwrap();

    let tasks = plan.tasks();
    assert_eq!(order(&tasks), vec!["uninstall g:A:1.0", "uninstall g:B:1.0"]);
    assert_eq!(tasks[0].state(), TaskState::Error);
    assert!(matches!(tasks[1].error(), Some(Error::DependencyFailed { .. })));
    assert!(is_installed(&registry, "g:A:1.0"));
    assert!(is_installed(&registry, "g:B:1.0"));
}

#[test]
fn test_extract_leaves_install_flag_alone() {
    let temp = TempDir::new().unwrap();
    let session = fs_session(&temp);
    let registry = registry_with(&[("g:A:1.0", &[])]);

    let plan = registry
        .create_execution_plan()
        .task(id("g:A:1.0"), TaskType::Extract)
        .with_session(session.clone())
        .build()
        .unwrap();
    plan.execute().unwrap();

    assert!(!plan.has_errors());
    assert!(!is_installed(&registry, "g:A:1.0"));
    assert_eq!(session.read("/apps/A/A.txt").unwrap().as_deref(), Some("A 1.0"));
}

#[test]
fn test_caller_filter_restricts_applied_content() {
    let temp = TempDir::new().unwrap();
    let session = fs_session(&temp);
    let registry = registry_with(&[("g:A:1.0", &["g:B"]), ("g:B:1.0", &[])]);

    let mut builder = registry.create_execution_plan();
    builder.task(id("g:A:1.0"), TaskType::Install);
    builder.configure(
        PlanConfig::new()
            .with_session(session.clone())
            .with_filter(packreg::ContentFilter::new(["/apps/A"])),
    );
    builder.build().unwrap().execute().unwrap();

    assert!(session.read("/apps/A/A.txt").unwrap().is_some());
    assert!(session.read("/apps/B/B.txt").unwrap().is_none());
    // Bookkeeping still happens for filtered packages
    assert!(is_installed(&registry, "g:B:1.0"));
}
