// src/plan/persist.rs

//! Persisted plan format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <executionPlan version="1.0">
//!     <task cmd="install" packageId="group:name:version"/>
//! </executionPlan>
//! ```
//!
//! Documents carrying a DOCTYPE are rejected outright, so no external
//! entity is ever resolved.

use super::TaskType;
use crate::error::{Error, Result};
use crate::packages::PackageId;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::{BufRead, Read, Write};

/// Highest format version this implementation reads
pub const SUPPORTED_VERSION: f64 = 1.0;

const TAG_EXECUTION_PLAN: &[u8] = b"executionPlan";
const TAG_TASK: &[u8] = b"task";
const ATTR_VERSION: &[u8] = b"version";
const ATTR_CMD: &[u8] = b"cmd";
const ATTR_PACKAGE_ID: &[u8] = b"packageId";

const INDENT: &[u8] = b"    ";

/// A parsed plan file
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDocument {
    pub version: f64,
    pub tasks: Vec<(PackageId, TaskType)>,
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::invalid_data(format!("Plan file error: {e}"))
}

/// Write a plan document
pub fn write_plan<'a, W, I>(out: W, version: f64, tasks: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a PackageId, TaskType)>,
{
    let mut writer = Writer::new(out);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    writer.get_mut().write_all(b"\n")?;

    let version = format!("{version:?}");
    let root = BytesStart::new("executionPlan").with_attributes([("version", version.as_str())]);
    writer.write_event(Event::Start(root)).map_err(xml_error)?;
    writer.get_mut().write_all(b"\n")?;

    for (id, task_type) in tasks {
        let id = id.to_string();
        let task = BytesStart::new("task")
            .with_attributes([("cmd", task_type.as_str()), ("packageId", id.as_str())]);
        writer.get_mut().write_all(INDENT)?;
        writer.write_event(Event::Empty(task)).map_err(xml_error)?;
        writer.get_mut().write_all(b"\n")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("executionPlan")))
        .map_err(xml_error)?;
    writer.get_mut().write_all(b"\n")?;
    writer.get_mut().flush()?;
    Ok(())
}

/// Tracks the last byte handed to the XML reader
struct LastByte<R> {
    inner: R,
    last: Option<u8>,
}

impl<R: BufRead> Read for LastByte<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(out)?;
        if n > 0 {
            self.last = Some(out[n - 1]);
        }
        Ok(n)
    }
}

impl<R: BufRead> BufRead for LastByte<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if amt > 0
            && let Ok(available) = self.inner.fill_buf()
            && let Some(&byte) = available.get(amt - 1)
        {
            self.last = Some(byte);
        }
        self.inner.consume(amt);
    }
}

/// Read a plan document
///
/// Syntax errors, a wrong root element, a document cut short, and
/// unsupported versions are I/O errors; an unknown `cmd` or malformed
/// `packageId` is a package error. Task attributes are only interpreted
/// once the whole document has parsed.
pub fn read_plan<R: BufRead>(input: R) -> Result<PlanDocument> {
    let mut reader = Reader::from_reader(LastByte { inner: input, last: None });
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut version: Option<f64> = None;
    let mut raw_tasks: Vec<(String, String)> = Vec::new();
    let mut closed = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?;
        if matches!(event, Event::Start(_) | Event::Empty(_) | Event::End(_))
            && reader.get_ref().last != Some(b'>')
        {
            return Err(xml_error(format!(
                "unterminated element at position {}",
                reader.buffer_position()
            )));
        }
        match event {
            Event::DocType(_) => {
                return Err(Error::invalid_data(
                    "DOCTYPE declarations are not allowed in plan files",
                ));
            }
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match depth {
                    0 if version.is_none() && !closed => {
                        if e.name().as_ref() != TAG_EXECUTION_PLAN {
                            return Err(Error::invalid_data("<executionPlan> expected."));
                        }
                        version = Some(read_version(e)?);
                        closed = empty;
                    }
                    0 => return Err(Error::invalid_data("plan file has more than one root element")),
                    1 => {
                        if e.name().as_ref() != TAG_TASK {
                            return Err(Error::invalid_data("<task> expected."));
                        }
                        raw_tasks.push((
                            attribute(e, ATTR_CMD)?.unwrap_or_default(),
                            attribute(e, ATTR_PACKAGE_ID)?.unwrap_or_default(),
                        ));
                    }
                    _ => {}
                }
                if !empty {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    closed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let version = version.ok_or_else(|| Error::invalid_data("<executionPlan> expected."))?;
    if !closed || depth != 0 {
        return Err(Error::invalid_data(
            "Plan file error: </executionPlan> expected before end of file",
        ));
    }

    let tasks = raw_tasks
        .iter()
        .map(|(cmd, id)| read_task(cmd, id))
        .collect::<Result<Vec<_>>>()?;
    Ok(PlanDocument { version, tasks })
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn read_version(e: &BytesStart<'_>) -> Result<f64> {
    let version = match attribute(e, ATTR_VERSION)? {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::invalid_data(format!("invalid plan version '{v}'")))?,
        _ => SUPPORTED_VERSION,
    };
    if !version.is_finite() {
        return Err(Error::invalid_data(format!("invalid plan version '{version}'")));
    }
    if version > SUPPORTED_VERSION {
        return Err(Error::invalid_data(format!("version {version:?} not supported.")));
    }
    Ok(version)
}

fn read_task(cmd: &str, id: &str) -> Result<(PackageId, TaskType)> {
    let task_type: TaskType = cmd.parse()?;
    let id = PackageId::parse(id)
        .map_err(|err| Error::Package(format!("invalid packageId '{id}': {err}")))?;
    Ok((id, task_type))
}
