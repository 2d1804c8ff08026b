// src/plan/journal.rs

//! Append-only execution journal for plan recovery
//!
//! Each record is one line with a CRC32 checksum:
//!
//! Format: `{crc32_hex}|{json}\n`
//!
//! A plan executed with a journal directory writes `plan-<id>.xml` and
//! `plan-<id>.journal` there. Both move to `archive/` once the plan
//! completes; a journal left behind without a `Done` record marks a plan
//! interrupted mid-flight.

use super::{ExecutionPlanBuilder, TaskState, TaskType};
use crate::error::{Error, Result};
use crate::packages::PackageId;
use crate::registry::PackageRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const PREFIX: &str = "plan-";
const ARCHIVE_DIR: &str = "archive";

/// A record in the execution journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JournalRecord {
    /// Execution started
    Begin {
        plan_id: String,
        task_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A task changed state
    Task {
        index: usize,
        package: PackageId,
        cmd: TaskType,
        state: TaskState,
        error: Option<String>,
    },

    /// Every task reached a terminal state
    Done { duration_ms: u64, success: bool },
}

impl JournalRecord {
    fn is_barrier(&self) -> bool {
        matches!(self, Self::Begin { .. } | Self::Done { .. })
    }
}

/// Journal file of a plan
pub fn journal_path(dir: &Path, plan_id: &str) -> PathBuf {
    dir.join(format!("{PREFIX}{plan_id}.journal"))
}

/// Persisted task list of a plan
pub fn plan_path(dir: &Path, plan_id: &str) -> PathBuf {
    dir.join(format!("{PREFIX}{plan_id}.xml"))
}

/// Append-only journal with fsync on begin and done
pub struct PlanJournal {
    path: PathBuf,
    file: File,
    plan_id: String,
}

impl PlanJournal {
    /// Create the journal of a new plan
    pub fn create(dir: &Path, plan_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let path = journal_path(dir, plan_id);
        let file = OpenOptions::new().create_new(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            plan_id: plan_id.to_string(),
        })
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record; begin and done records are synced to disk
    pub fn write(&mut self, record: &JournalRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| Error::invalid_data(format!("Failed to serialize journal record: {e}")))?;
        let crc = crc32fast::hash(json.as_bytes());
        writeln!(self.file, "{crc:08x}|{json}")?;

        if record.is_barrier() {
            self.file.flush()?;
            self.file.sync_all()?;
        }
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<JournalRecord>> {
        read_records(&self.path)
    }

    /// Move the journal and its plan file to `archive/`
    pub fn archive(self) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        archive_files(dir, &self.plan_id)
    }
}

fn archive_files(dir: &Path, plan_id: &str) -> Result<()> {
    let archive_dir = dir.join(ARCHIVE_DIR);
    fs::create_dir_all(&archive_dir)?;

    for path in [journal_path(dir, plan_id), plan_path(dir, plan_id)] {
        if let Some(name) = path.file_name()
            && path.exists()
        {
            fs::rename(&path, archive_dir.join(name))?;
        }
    }
    Ok(())
}

/// Read every intact record of a journal
///
/// Reading stops at the first record whose checksum does not match.
pub fn read_records(path: &Path) -> Result<Vec<JournalRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let Some((crc, json)) = line.split_once('|') else {
            warn!("Malformed journal line {}: missing delimiter", line_num + 1);
            continue;
        };

        let expected = u32::from_str_radix(crc, 16).map_err(|_| {
            Error::invalid_data(format!("Invalid CRC32 at line {}: {}", line_num + 1, crc))
        })?;
        let actual = crc32fast::hash(json.as_bytes());
        if expected != actual {
            warn!(
                "CRC mismatch at line {}: expected {:08x}, got {:08x}",
                line_num + 1,
                expected,
                actual
            );
            break;
        }

        let record = serde_json::from_str(json).map_err(|e| {
            Error::invalid_data(format!(
                "Failed to parse journal record at line {}: {}",
                line_num + 1,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Ids of plans whose journal has no `Done` record
pub fn pending_plans(dir: &Path) -> Result<Vec<String>> {
    let mut pending = Vec::new();
    if !dir.exists() {
        return Ok(pending);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|e| e != "journal") {
            continue;
        }
        let Some(plan_id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(PREFIX))
        else {
            continue;
        };

        let done = read_records(&path)?
            .iter()
            .any(|r| matches!(r, JournalRecord::Done { .. }));
        if !done {
            pending.push(plan_id.to_string());
        }
    }

    pending.sort();
    Ok(pending)
}

/// Tasks the journal recorded as finished
pub fn finished_tasks(records: &[JournalRecord]) -> HashSet<(PackageId, TaskType)> {
    records
        .iter()
        .filter_map(|r| match r {
            JournalRecord::Task {
                package,
                cmd,
                state: TaskState::Finished,
                ..
            } => Some((package.clone(), *cmd)),
            _ => None,
        })
        .collect()
}

/// Rebuild the unfinished remainder of an interrupted plan
///
/// The returned builder holds the persisted tasks minus those the journal
/// recorded as finished; it still has to be validated and given a session.
/// The interrupted plan stays pending until [`archive_recovered`] is called,
/// which callers do once the rebuilt plan has been built.
pub fn recover(dir: &Path, plan_id: &str, registry: &Arc<PackageRegistry>) -> Result<ExecutionPlanBuilder> {
    let journal = journal_path(dir, plan_id);
    let plan_file = plan_path(dir, plan_id);
    if !journal.exists() || !plan_file.exists() {
        return Err(Error::Package(format!("no interrupted plan with id {plan_id}")));
    }

    let finished = finished_tasks(&read_records(&journal)?);
    let mut builder = registry.create_execution_plan();
    builder.load_file(&plan_file)?;
    let total = builder.len();
    builder.retain_tasks(|id, task_type| !finished.contains(&(id.clone(), task_type)));

    info!(
        "Recovered plan {}: {} of {} task(s) remain",
        plan_id,
        builder.len(),
        total
    );
    Ok(builder)
}

/// Retire an interrupted plan whose remainder has been rebuilt
pub fn archive_recovered(dir: &Path, plan_id: &str) -> Result<()> {
    if !journal_path(dir, plan_id).exists() {
        return Err(Error::Package(format!("no interrupted plan with id {plan_id}")));
    }
    archive_files(dir, plan_id)?;
    info!("Archived interrupted plan {}", plan_id);
    Ok(())
}
