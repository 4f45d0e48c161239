//! CSV serialization and the dated + latest dual write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

/// The two files every stage output is written to.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dated: PathBuf,
    pub latest: PathBuf,
}

impl Snapshot {
    /// Write `bytes` to the dated file, then to the latest alias.
    ///
    /// Each file is replaced atomically. An interruption between the two
    /// writes leaves the latest alias at the previous run's content.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.dated, bytes)?;
        write_atomic(&self.latest, bytes)?;
        Ok(())
    }
}

/// Local run date used in dated file names.
pub fn run_stamp() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    debug!(path = ?path, bytes = bytes.len(), "wrote file");
    Ok(())
}

/// Serialize rows under an explicit header, so empty tables still get one.
pub fn rows_to_csv<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    Ok(wtr.into_inner()?)
}

/// Serialize pre-rendered string records under a header.
pub fn records_to_csv(header: &[&str], records: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record(header)?;
    for rec in records {
        wtr.write_record(rec)?;
    }
    Ok(wtr.into_inner()?)
}
