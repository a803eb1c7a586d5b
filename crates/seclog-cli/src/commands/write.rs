//! Write command implementation.
//!
//! Appends one entry to today's daily file in the same line layout the
//! readers parse, so the file can be archived like any other.

use std::io::Write;
use std::path::Path;

use seclog_core::{DailyLogWriter, LogLevel, NewEntry};
use tracing::debug;

use crate::cli::WriteArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, WriteOutput};

/// Handler for the write command.
pub struct WriteCommand {
    writer: DailyLogWriter,
}

impl WriteCommand {
    /// Creates a write command appending under `log_root`.
    #[must_use]
    pub fn new(log_root: &Path) -> Self {
        Self {
            writer: DailyLogWriter::new(log_root),
        }
    }

    /// Validates the arguments and appends the entry.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidArgument`] if the environment or level
    /// could not be parsed back, or the context is not a JSON object.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &WriteArgs,
    ) -> Result<(), CliError> {
        let entry = build_entry(args)?;
        let path = self.writer.append(&entry)?;
        debug!(file = %path.display(), "entry written");

        let output = WriteOutput {
            file: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            line: entry.format_line(),
        };
        format.write(out, &output)
    }
}

fn build_entry(args: &WriteArgs) -> Result<NewEntry, CliError> {
    if args.env.is_empty() || args.env.chars().any(|c| c.is_whitespace() || c == '.') {
        return Err(CliError::InvalidArgument(format!(
            "environment must be one word without dots, got {:?}",
            args.env
        )));
    }
    if args.level.is_empty() || !args.level.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CliError::InvalidArgument(format!(
            "level must be a single word, got {:?}",
            args.level
        )));
    }

    let mut entry = NewEntry::now(
        args.env.clone(),
        LogLevel::parse(&args.level.to_uppercase()),
        args.message.clone(),
    );

    if let Some(raw) = &args.context {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(context)) => entry = entry.with_context(context),
            Ok(_) => {
                return Err(CliError::InvalidArgument(
                    "context must be a JSON object".to_string(),
                ));
            }
            Err(e) => {
                return Err(CliError::InvalidArgument(format!("context is not valid JSON: {e}")));
            }
        }
    }

    Ok(entry)
}
