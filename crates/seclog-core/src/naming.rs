//! File naming conventions shared by the sink, readers and the compactor.
//!
//! - Daily files: `security-YYYY-MM-DD.log`
//! - Monthly archives: `security-logs-YYYY-MM.zip`
//!
//! Archive identifiers coming from callers are checked against a fixed
//! pattern before any path is built from them.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{LogError, Result};

/// Extension of archives written by the compactor.
pub const ARCHIVE_EXTENSION: &str = "zip";

static DAILY_FILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^security-(\d{4}-\d{2}-\d{2})\.log$").unwrap_or_else(|_| unreachable!())
});

static ARCHIVE_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^security-logs-(\d{4})-(\d{2})\.(zip|gz)$").unwrap_or_else(|_| unreachable!())
});

/// Calendar month used to group daily files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    /// Calendar year
    pub year: i32,
    /// Month, 1 through 12
    pub month: u32,
}

impl MonthKey {
    /// Returns the month a date falls in.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Returns the name of this month's archive.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("security-logs-{self}.{ARCHIVE_EXTENSION}")
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A file name following the daily log convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DailyFileName {
    date: NaiveDate,
    name: String,
}

impl DailyFileName {
    /// Builds the file name for a date.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            name: format!("security-{}.log", date.format("%Y-%m-%d")),
        }
    }

    /// Parses a base file name. Returns `None` for anything that is not a
    /// daily log file, including impossible dates.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let captures = DAILY_FILE_REGEX.captures(name)?;
        let date = NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d").ok()?;
        Some(Self {
            date,
            name: name.to_string(),
        })
    }

    /// The date embedded in the name.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// The month the file belongs to.
    #[must_use]
    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.date)
    }

    /// The file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DailyFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A caller-supplied archive identifier that passed validation.
///
/// The pattern admits no separators or dots outside the extension, so a
/// valid id can be joined onto the archive directory as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveId {
    name: String,
    month: MonthKey,
}

impl ArchiveId {
    /// Validates an archive identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidIdentifier`] if the name does not match
    /// `security-logs-YYYY-MM.(zip|gz)` or names a month that cannot exist.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || LogError::InvalidIdentifier(name.to_string());
        let captures = ARCHIVE_ID_REGEX.captures(name).ok_or_else(invalid)?;
        let year = captures
            .get(1)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .ok_or_else(invalid)?;
        let month = captures
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(invalid)?;

        Ok(Self {
            name: name.to_string(),
            month: MonthKey { year, month },
        })
    }

    /// The archive file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The month the archive covers.
    #[must_use]
    pub const fn month(&self) -> MonthKey {
        self.month
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
