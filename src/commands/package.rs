// src/commands/package.rs
//! Catalog commands: registration and dependency queries

use super::{open_registry, parse_id};
use anyhow::{Context, Result};
use packreg::Dependency;
use std::path::Path;
use tracing::info;

/// Create the registry database and its data directories
pub fn cmd_init(db_path: &str) -> Result<()> {
    info!("Initializing registry database at: {}", db_path);
    let registry = open_registry(db_path)?;
    let config = registry.config();
    std::fs::create_dir_all(&config.content_root)?;
    std::fs::create_dir_all(&config.plan_dir)?;
    println!("Registry initialized at: {}", db_path);
    Ok(())
}

pub fn cmd_register(manifest: &str, db_path: &str, replace: bool) -> Result<()> {
    let registry = open_registry(db_path)?;
    let id = registry
        .register_file(Path::new(manifest), replace)
        .with_context(|| format!("Failed to register {manifest}"))?;
    println!("Registered {}", id);
    Ok(())
}

pub fn cmd_list(db_path: &str, installed_only: bool) -> Result<()> {
    let registry = open_registry(db_path)?;
    let mut shown = 0;

    for id in registry.packages()? {
        let Some(package) = registry.open(&id)? else {
            continue;
        };
        if installed_only && !package.is_installed() {
            continue;
        }
        let marker = if package.is_installed() { "[installed]" } else { "" };
        println!("  {} {}", id, marker);
        shown += 1;
    }

    if shown == 0 {
        println!("No packages found.");
    } else {
        println!("\nTotal: {} package(s)", shown);
    }
    Ok(())
}

pub fn cmd_info(package: &str, db_path: &str) -> Result<()> {
    let registry = open_registry(db_path)?;
    let id = parse_id(package)?;
    let package = registry
        .open(&id)?
        .ok_or_else(|| anyhow::anyhow!("Package '{}' is not registered", id))?;

    println!("Package: {}", package.id());
    println!("  Group:     {}", id.group());
    println!("  Name:      {}", id.name());
    println!("  Version:   {}", id.version());
    println!("  Installed: {}", package.is_installed());
    if let Some(at) = package.registered_at {
        println!("  Registered: {}", at.to_rfc3339());
    }
    if let Some(at) = package.installed_at {
        println!("  Installed at: {}", at.to_rfc3339());
    }

    if package.dependencies().is_empty() {
        println!("  Dependencies: none");
    } else {
        println!("  Dependencies:");
        for dep in package.dependencies() {
            println!("    {}", dep);
        }
    }

    let content = registry.content(&id)?;
    println!("  Content roots: {}", content.roots.join(", "));
    println!("  Content entries: {}", content.entries.len());
    Ok(())
}

pub fn cmd_resolve(dependency: &str, db_path: &str, only_installed: bool) -> Result<()> {
    let registry = open_registry(db_path)?;
    let dependency =
        Dependency::parse(dependency).with_context(|| format!("Invalid dependency '{dependency}'"))?;

    match registry.resolve(&dependency, only_installed)? {
        Some(id) => println!("{} -> {}", dependency, id),
        None => {
            return Err(anyhow::anyhow!("No registered package matches {}", dependency));
        }
    }
    Ok(())
}

pub fn cmd_deps(package: &str, db_path: &str, only_installed: bool) -> Result<()> {
    let registry = open_registry(db_path)?;
    let id = parse_id(package)?;
    let package = registry
        .open(&id)?
        .ok_or_else(|| anyhow::anyhow!("Package '{}' is not registered", id))?;
    let report = registry.analyze_dependencies(&id, only_installed)?;

    println!("Dependencies of {}:", id);
    for dep in package.dependencies() {
        match report.resolved.get(dep) {
            Some(target) => println!("  {} -> {}", dep, target),
            None => println!("  {} -> UNRESOLVED", dep),
        }
    }
    if !report.is_complete() {
        println!("\n{} unresolved dependency(ies)", report.unresolved.len());
    }
    Ok(())
}

pub fn cmd_usage(package: &str, db_path: &str) -> Result<()> {
    let registry = open_registry(db_path)?;
    let id = parse_id(package)?;
    let users = registry.usage(&id)?;

    if users.is_empty() {
        println!("No registered package depends on {}", id);
    } else {
        println!("Packages depending on {}:", id);
        for user in &users {
            println!("  {}", user);
        }
    }
    Ok(())
}
