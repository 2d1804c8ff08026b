// src/cli/plan.rs
//! Plan commands: create, inspect, run, and recover execution plans

use clap::Subcommand;

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Validate requested tasks and write the ordered plan
    Create {
        /// Package to install (repeatable)
        #[arg(long)]
        install: Vec<String>,

        /// Package to uninstall (repeatable)
        #[arg(long)]
        uninstall: Vec<String>,

        /// Package to remove from the catalog (repeatable)
        #[arg(long)]
        remove: Vec<String>,

        /// Package to extract (repeatable)
        #[arg(long)]
        extract: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Validate a saved plan and print its task order
    Show {
        /// Plan file
        file: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Execute a saved plan
    Run {
        /// Plan file
        file: String,

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

    /// List plans interrupted before completion
    Pending {
        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,
    },

    /// Resume an interrupted plan
    Recover {
        /// Plan id as shown by `plan pending`
        plan_id: String,

        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/packreg/registry.db")]
        db_path: String,

        /// Content root directory (default: derived from the database path)
        #[arg(short, long)]
        root: Option<String>,

        /// Show the remaining tasks without executing them
        #[arg(long)]
        dry_run: bool,
    },
}
