// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, PlanCommands};
use packreg::TaskType;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { db_path }) => commands::cmd_init(&db_path),
        Some(Commands::Register {
            manifest,
            db_path,
            replace,
        }) => commands::cmd_register(&manifest, &db_path, replace),
        Some(Commands::List { db_path, installed }) => commands::cmd_list(&db_path, installed),
        Some(Commands::Info { package, db_path }) => commands::cmd_info(&package, &db_path),
        Some(Commands::Resolve {
            dependency,
            db_path,
            only_installed,
        }) => commands::cmd_resolve(&dependency, &db_path, only_installed),
        Some(Commands::Deps {
            package,
            db_path,
            only_installed,
        }) => commands::cmd_deps(&package, &db_path, only_installed),
        Some(Commands::Usage { package, db_path }) => commands::cmd_usage(&package, &db_path),
        Some(Commands::Install {
            packages,
            db_path,
            root,
            filters,
            dry_run,
        }) => commands::cmd_tasks(
            TaskType::Install,
            &packages,
            &db_path,
            root.as_deref(),
            &filters,
            dry_run,
        ),
        Some(Commands::Uninstall {
            packages,
            db_path,
            root,
            dry_run,
        }) => commands::cmd_tasks(
            TaskType::Uninstall,
            &packages,
            &db_path,
            root.as_deref(),
            &[],
            dry_run,
        ),
        Some(Commands::Remove { packages, db_path }) => {
            commands::cmd_tasks(TaskType::Remove, &packages, &db_path, None, &[], false)
        }
        Some(Commands::Extract {
            packages,
            db_path,
            root,
            filters,
        }) => commands::cmd_tasks(
            TaskType::Extract,
            &packages,
            &db_path,
            root.as_deref(),
            &filters,
            false,
        ),
        Some(Commands::Plan(command)) => match command {
            PlanCommands::Create {
                install,
                uninstall,
                remove,
                extract,
                output,
                db_path,
            } => commands::cmd_plan_create(
                &[
                    (TaskType::Install, install.as_slice()),
                    (TaskType::Uninstall, uninstall.as_slice()),
                    (TaskType::Remove, remove.as_slice()),
                    (TaskType::Extract, extract.as_slice()),
                ],
                output.as_deref(),
                &db_path,
            ),
            PlanCommands::Show { file, db_path } => commands::cmd_plan_show(&file, &db_path),
            PlanCommands::Run {
                file,
                db_path,
                root,
                filters,
            } => commands::cmd_plan_run(&file, &db_path, root.as_deref(), &filters),
            PlanCommands::Pending { db_path } => commands::cmd_plan_pending(&db_path),
            PlanCommands::Recover {
                plan_id,
                db_path,
                root,
                dry_run,
            } => commands::cmd_plan_recover(&plan_id, &db_path, root.as_deref(), dry_run),
        },
        None => {
            println!("packreg: content package registry");
            println!("Run 'packreg --help' for usage information");
            Ok(())
        }
    }
}
