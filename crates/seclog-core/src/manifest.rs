//! Append-only ledger of completed moves.
//!
//! One JSON line per daily file moved into an archive. The ledger is an
//! audit aid: directory listings stay authoritative, and a failed ledger
//! write never changes the outcome of an archival run.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the ledger inside the archive directory.
pub const MANIFEST_FILE: &str = "manifest.jsonl";

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Daily file that was moved
    pub file: String,
    /// Archive it was moved into
    pub archive: String,
    /// Archive size after the move
    pub size: u64,
    /// When the source was removed
    pub archived_at: DateTime<Utc>,
}

/// Ledger stored beside the archives.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    /// Opens the ledger in `archive_dir`. Nothing is created until the
    /// first append.
    #[must_use]
    pub fn in_dir(archive_dir: &Path) -> Self {
        Self {
            path: archive_dir.join(MANIFEST_FILE),
        }
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be serialized or written.
    pub fn append(&self, entry: &ManifestEntry) -> Result<()> {
        let line = format!("{}\n", serde_json::to_string(entry)?);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Reads every well-formed entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger exists but cannot be opened.
    pub fn read_all(&self) -> Result<Vec<ManifestEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(BufReader::new(file)
            .lines()
            .map_while(std::result::Result::ok)
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect())
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
