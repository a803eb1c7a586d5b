//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use seclog_core::{ArchiveMetadata, ArchiveReport, LogRecord, PaginatedResult, Statistics};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for PaginatedResult<LogRecord> {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if let Some(archive) = &self.archive {
            writeln!(writer, "Archive: {archive}")?;
        }
        if self.data.is_empty() {
            writeln!(writer, "No records on page {}", self.current_page)?;
        } else {
            writeln!(
                writer,
                "{:<19}  {:<12}  {:<9}  {}",
                "DATETIME", "ENV", "LEVEL", "MESSAGE"
            )?;
            writeln!(writer, "{}", "─".repeat(96))?;
            for record in &self.data {
                write!(
                    writer,
                    "{:<19}  {:<12}  {:<9}  {}",
                    record.datetime.format(seclog_core::types::DATETIME_FORMAT),
                    truncate(&record.environment, 12),
                    record.level,
                    record.message
                )?;
                if !record.context.is_empty() {
                    let context = serde_json::to_string(&record.context)
                        .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                    write!(writer, " {context}")?;
                }
                writeln!(writer)?;
            }
        }
        writeln!(writer)?;
        writeln!(
            writer,
            "Page {} of {} ({} record(s) total)",
            self.current_page, self.last_page, self.total
        )?;
        Ok(())
    }
}

/// Archives for listing.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ArchiveList {
    /// Archives, newest first.
    pub archives: Vec<ArchiveMetadata>,
}

impl TableDisplay for ArchiveList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.archives.is_empty() {
            writeln!(writer, "No archives")?;
            return Ok(());
        }

        writeln!(writer, "{:<28}  {:>12}  {}", "NAME", "SIZE (B)", "CREATED")?;
        writeln!(writer, "{}", "─".repeat(68))?;
        for archive in &self.archives {
            writeln!(
                writer,
                "{:<28}  {:>12}  {}",
                archive.name,
                archive.size,
                archive.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} archive(s)", self.archives.len())?;
        Ok(())
    }
}

impl TableDisplay for ArchiveReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.is_noop() {
            writeln!(writer, "Nothing to archive")?;
        }
        for moved in &self.archived {
            writeln!(writer, "archived  {} -> {} ({} B)", moved.from, moved.to, moved.size)?;
        }
        for error in &self.errors {
            writeln!(writer, "error     {error}")?;
        }
        if self.cancelled {
            writeln!(writer, "Run cancelled before all months were processed")?;
        }
        if !self.is_noop() {
            writeln!(writer)?;
            writeln!(
                writer,
                "Archived: {}  Errors: {}",
                self.archived.len(),
                self.errors.len()
            )?;
        }
        Ok(())
    }
}

impl TableDisplay for Statistics {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Security Logs")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Active")?;
        writeln!(writer, "  Files:          {}", self.active_files)?;
        writeln!(writer, "  Records:        {}", self.active_count)?;
        writeln!(writer)?;
        writeln!(writer, "Archived")?;
        writeln!(writer, "  Archives:       {}", self.archived_count)?;
        writeln!(writer, "  Size:           {} B", self.archived_size)?;
        if !self.level_distribution.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Levels")?;
            for (level, count) in &self.level_distribution {
                writeln!(writer, "  {:<16}{count}", format!("{level}:"))?;
            }
        }
        Ok(())
    }
}

/// Result of the write command.
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutput {
    /// Daily file the entry went to.
    pub file: String,
    /// The line as written.
    pub line: String,
}

impl TableDisplay for WriteOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Wrote to {}", self.file)?;
        writeln!(writer, "  {}", self.line)?;
        Ok(())
    }
}

/// Summary printed when the daemon exits.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonSummary {
    /// Completed archival runs.
    pub runs: u64,
}

impl TableDisplay for DaemonSummary {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Scheduler stopped after {} run(s)", self.runs)?;
        Ok(())
    }
}

/// Truncate a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
