// src/cli/mod.rs
//! CLI definitions for the packreg registry
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Primary commands work on the catalog directly:
//! - `register` - Register a package manifest
//! - `list` / `info` - Inspect the catalog
//! - `resolve` / `deps` / `usage` - Dependency queries
//! - `install` / `uninstall` / `remove` / `extract` - One-shot plans
//!
//! Plan management lives under `plan` (create, show, run, pending, recover).

use clap::{Parser, Subcommand};

mod plan;

pub use plan::PlanCommands;

#[derive(Parser)]
#[command(name = "packreg")]
#[command(author = "Packreg Contributors")]
#[command(version)]
#[command(about = "Content package registry with dependency-ordered execution plans", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new registry database
    Init {
        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Register a package from its TOML manifest
    Register {
        /// Path to the manifest
        manifest: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Replace an already registered package with the same id
        #[arg(long)]
        replace: bool,
    },

    /// List registered packages
    List {
        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Only show installed packages
        #[arg(short, long)]
        installed: bool,
    },

    /// Show a registered package
    Info {
        /// Package id (group:name:version)
        package: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Resolve a dependency to the best registered match
    Resolve {
        /// Dependency (group:name[:range])
        dependency: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Only consider installed packages
        #[arg(long)]
        only_installed: bool,
    },

    /// Show how the dependencies of a package resolve
    Deps {
        /// Package id (group:name:version)
        package: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Only consider installed packages
        #[arg(long)]
        only_installed: bool,
    },

    /// Show registered packages that depend on a package
    Usage {
        /// Package id (group:name:version)
        package: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Install packages and their missing dependencies
    Install {
        /// Package ids (group:name:version)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Content root directory (default: derived from the database path)
        #[arg(short, long)]
        root: Option<String>,

        /// Only apply content below these roots
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Uninstall packages, cascading to installed dependents
    Uninstall {
        /// Package ids (group:name:version)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Content root directory (default: derived from the database path)
        #[arg(short, long)]
        root: Option<String>,

        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove packages from the catalog
    Remove {
        /// Package ids (group:name:version)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Write package content without marking it installed
    Extract {
        /// Package ids (group:name:version)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Content root directory (default: derived from the database path)
        #[arg(short, long)]
        root: Option<String>,

        /// Only apply content below these roots
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Execution plan management
    #[command(subcommand)]
    Plan(PlanCommands),
}
