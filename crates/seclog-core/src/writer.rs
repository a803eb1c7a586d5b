//! Daily log file sink.
//!
//! Produces files in the layout the readers and the compactor consume:
//! one `security-YYYY-MM-DD.log` per day, one line per record. The
//! production sink lives outside this crate; [`DailyLogWriter`] follows the
//! same output contract for tooling and tests.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;

use crate::error::Result;
use crate::naming::DailyFileName;
use crate::types::{LogLevel, DATETIME_FORMAT};

/// A record to be appended to a daily file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    /// Local timestamp; the file is chosen by its date
    pub datetime: NaiveDateTime,
    /// Deployment label
    pub environment: String,
    /// Severity level
    pub level: LogLevel,
    /// Free text
    pub message: String,
    /// Optional JSON context appended after the message
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl NewEntry {
    /// Creates an entry stamped with the current local time.
    #[must_use]
    pub fn now(environment: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            datetime: Local::now().naive_local(),
            environment: environment.into(),
            level,
            message: message.into(),
            context: serde_json::Map::new(),
        }
    }

    /// Overrides the timestamp.
    #[must_use]
    pub const fn at(mut self, datetime: NaiveDateTime) -> Self {
        self.datetime = datetime;
        self
    }

    /// Attaches a JSON context.
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Renders the entry as one log line, without the newline.
    #[must_use]
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "[{}] {}.{}: {}",
            self.datetime.format(DATETIME_FORMAT),
            self.environment,
            self.level,
            self.message.replace(['\r', '\n'], " ")
        );
        if !self.context.is_empty() {
            line.push(' ');
            line.push_str(&serde_json::Value::Object(self.context.clone()).to_string());
        }
        line
    }
}

/// Appends entries to per-day files under a log root.
pub struct DailyLogWriter {
    log_root: PathBuf,
    write_lock: Mutex<()>,
}

impl DailyLogWriter {
    /// Creates a writer rooted at `log_root`.
    #[must_use]
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Appends one entry to the file for its date, creating the file and
    /// the log root as needed. Returns the path written to.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn append(&self, entry: &NewEntry) -> Result<PathBuf> {
        let name = DailyFileName::for_date(entry.datetime.date());
        let path = self.log_root.join(name.as_str());
        let line = format!("{}\n", entry.format_line());

        let _guard = self.write_lock.lock();
        fs::create_dir_all(&self.log_root)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;

        Ok(path)
    }
}
