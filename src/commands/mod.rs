// src/commands/mod.rs
//! Command handlers for the packreg CLI

mod package;
mod plan;

pub use package::{
    cmd_deps, cmd_info, cmd_init, cmd_list, cmd_register, cmd_resolve, cmd_usage,
};
pub use plan::{
    cmd_plan_create, cmd_plan_pending, cmd_plan_recover, cmd_plan_run, cmd_plan_show,
    cmd_tasks,
};

use anyhow::{Context, Result};
use packreg::{PackageId, PackageRegistry, RegistryConfig};
use std::sync::Arc;

/// Open the registry stored at `db_path`
pub(crate) fn open_registry(db_path: &str) -> Result<Arc<PackageRegistry>> {
    let registry = PackageRegistry::new(RegistryConfig::new(db_path))
        .with_context(|| format!("Failed to open registry at {db_path}"))?;
    Ok(Arc::new(registry))
}

pub(crate) fn parse_id(s: &str) -> Result<PackageId> {
    PackageId::parse(s).with_context(|| format!("Invalid package id '{s}'"))
}
