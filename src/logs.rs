//! Whole-file operations on the log directory: list, read, export, delete.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    model::Technology,
    session_log::{FILE_EXTENSION, FILE_PREFIX},
};

#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

impl LogFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A row of a log file as written by the session log.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRow {
    #[serde(rename = "first seen")]
    pub first_seen: String,
    #[serde(rename = "last seen")]
    pub last_seen: String,
    #[serde(rename = "type")]
    pub technology: String,
    #[serde(rename = "CID")]
    pub cell_id: String,
    #[serde(rename = "LAC")]
    pub area_code: String,
    #[serde(rename = "MCC")]
    pub mcc: String,
    #[serde(rename = "MNC")]
    pub mnc: String,
    #[serde(rename = "dBm")]
    pub dbm: String,
    #[serde(rename = "Operator")]
    pub operator_name: String,
    #[serde(rename = "EARFCN")]
    pub channel: String,
    #[serde(rename = "Bandwidth")]
    pub bandwidth: String,
}

impl LogRow {
    pub fn technology(&self) -> crate::error::Result<Technology> {
        Technology::parse(&self.technology)
    }
}

fn is_log_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|x| x.to_str()).unwrap_or("");
    name.starts_with(FILE_PREFIX) && path.extension().is_some_and(|x| x == FILE_EXTENSION)
}

/// Log files in `dir`, oldest first. A missing directory has no logs.
pub fn list_logs(dir: &Path) -> Result<Vec<LogFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(x) => x,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };

    let mut logs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !is_log_file(&path) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        logs.push(LogFile {
            path,
            modified: meta.modified()?,
            size: meta.len(),
        });
    }

    logs.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(logs)
}

/// The most recently modified log, i.e. the current session's.
pub fn latest_log(dir: &Path) -> Result<Option<LogFile>> {
    Ok(list_logs(dir)?.pop())
}

pub fn read_log(path: &Path) -> Result<Vec<LogRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        let row: LogRow =
            result.with_context(|| format!("Bad row {} in {}", i + 1, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Resolves file names given on the command line: bare names are looked up
/// in `dir`, anything with a directory component is taken as is.
pub fn resolve(dir: &Path, names: &[String]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = Path::new(name);
            if path.components().count() > 1 {
                path.to_owned()
            } else {
                dir.join(path)
            }
        })
        .collect()
}

/// Copies `files` into `dest`, creating it if needed. Returns how many files
/// were copied.
pub fn export_logs(files: &[PathBuf], dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    for file in files {
        let name = file
            .file_name()
            .with_context(|| format!("{} is not a file", file.display()))?;
        fs::copy(file, dest.join(name))
            .with_context(|| format!("Failed to export {}", file.display()))?;
    }
    Ok(files.len())
}

pub fn delete_logs(files: &[PathBuf]) -> Result<usize> {
    for file in files {
        fs::remove_file(file).with_context(|| format!("Failed to delete {}", file.display()))?;
    }
    Ok(files.len())
}
