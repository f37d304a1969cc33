//! Immutable batch artifacts
//!
//! Each flush produces one `<prefix>_<NNNNN>.json` file holding a JSON array
//! of records. The sequence continues from the number of artifacts already
//! on disk, and an existing artifact is never overwritten.

use crate::record::Dataset;
use crate::{HarvestError, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Builds the file name of artifact number `sequence`
pub fn artifact_name(prefix: &str, sequence: u32) -> String {
    format!("{}_{:05}.json", prefix, sequence)
}

/// Returns true if `file_name` is an artifact of `prefix`
fn is_artifact_name(file_name: &str, prefix: &str) -> bool {
    file_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(".json"))
        .map(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Lists the artifacts of `dataset` in `dir`, in sequence order
///
/// A missing directory has no artifacts.
pub fn list_artifacts(dir: &Path, dataset: Dataset) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let prefix = dataset.artifact_prefix();
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if is_artifact_name(name, prefix) && entry.file_type()?.is_file() {
                artifacts.push(entry.path());
            }
        }
    }

    // Zero padding makes lexical order the sequence order
    artifacts.sort();
    Ok(artifacts)
}

/// Writes numbered batch artifacts for one dataset
#[derive(Debug)]
pub struct BatchWriter {
    dir: PathBuf,
    prefix: &'static str,
    next_sequence: u32,
}

impl BatchWriter {
    /// Prepares to write artifacts into `dir`, creating it if needed
    pub fn open(dir: &Path, dataset: Dataset) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let existing = list_artifacts(dir, dataset)?.len() as u32;

        tracing::debug!(
            "Found {} existing {} artifacts in {}",
            existing,
            dataset,
            dir.display()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: dataset.artifact_prefix(),
            next_sequence: existing + 1,
        })
    }

    /// Path the next flush would be written to
    pub fn next_path(&self) -> PathBuf {
        self.dir.join(artifact_name(self.prefix, self.next_sequence))
    }

    /// Writes `records` as a new artifact and returns its path
    ///
    /// The array is written to a temporary file, synced, then renamed, so an
    /// artifact name only ever refers to a complete file.
    pub fn write(&mut self, records: &[Value]) -> Result<PathBuf> {
        // Never clobber an artifact, even if the directory holds gaps
        while self.next_path().exists() {
            self.next_sequence += 1;
        }

        let path = self.next_path();
        let tmp = self
            .dir
            .join(format!(".{}.tmp", artifact_name(self.prefix, self.next_sequence)));

        write_array(&tmp, records).map_err(|source| HarvestError::Artifact {
            path: path.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| HarvestError::Artifact {
            path: path.clone(),
            source,
        })?;

        self.next_sequence += 1;
        tracing::info!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

/// One element per line, so artifacts stay greppable
fn write_array(path: &Path, records: &[Value]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    writer.write_all(b"[")?;
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(b"\n")?;
        serde_json::to_writer(&mut writer, record)?;
    }
    writer.write_all(b"\n]\n")?;

    writer.flush()?;
    writer.get_ref().sync_all()
}
