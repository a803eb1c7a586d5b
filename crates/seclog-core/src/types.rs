//! Core types for the security log engine.
//!
//! This module provides:
//! - [`LogLevel`] - Severity levels as written by the log sink
//! - [`LogRecord`] - One parsed log line
//! - [`RecordId`] - Content-derived record fingerprint
//! - [`PaginatedResult`] - Fixed-shape pagination envelope
//! - [`ArchiveMetadata`], [`ArchiveReport`], [`Statistics`] - operation results

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// Timestamp layout used inside log lines.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Content-derived identifier of a record.
///
/// Two byte-identical records share an id; records are never addressed
/// individually for mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Derives the id from a record's timestamp and message.
    #[must_use]
    pub fn derive(datetime: &NaiveDateTime, message: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(datetime.format(DATETIME_FORMAT).to_string().as_bytes());
        hasher.update(message.as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Log severity levels, as written by the sink.
///
/// Unknown levels are kept verbatim in [`LogLevel::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Normal but significant events
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Any level outside the known set
    Other(String),
}

impl LogLevel {
    /// Parses a level as it appears in a log line.
    #[must_use]
    pub fn parse(level: &str) -> Self {
        match level {
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "NOTICE" => Self::Notice,
            "WARNING" => Self::Warning,
            "ERROR" => Self::Error,
            "CRITICAL" => Self::Critical,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the level as it appears in a log line.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Other(level) => level,
        }
    }

    /// Returns true for levels outside the known set.
    #[must_use]
    pub const fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LogLevel {
    fn from(level: String) -> Self {
        Self::parse(&level)
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

/// One parsed log line.
///
/// Records are rebuilt on every read; the file line is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Fingerprint of datetime and message
    pub id: RecordId,
    /// Local timestamp, second precision
    #[serde(with = "line_datetime")]
    pub datetime: NaiveDateTime,
    /// Deployment label
    pub environment: String,
    /// Severity level
    pub level: LogLevel,
    /// Message with any trailing JSON context removed
    pub message: String,
    /// Trailing JSON context, empty when absent
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

mod line_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATETIME_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(DATETIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// A validated page request. Both fields are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Records per page
    pub per_page: usize,
    /// 1-based page number
    pub page: usize,
}

impl PageRequest {
    /// Validates a page request.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidPage`] if either value is zero.
    pub fn new(per_page: usize, page: usize) -> Result<Self> {
        if per_page == 0 {
            return Err(LogError::InvalidPage("per_page must be at least 1".to_string()));
        }
        if page == 0 {
            return Err(LogError::InvalidPage("page must be at least 1".to_string()));
        }
        Ok(Self { per_page, page })
    }
}

/// Fixed-shape pagination envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Items on the requested page
    pub data: Vec<T>,
    /// Items across all pages
    pub total: usize,
    /// Page size used
    pub per_page: usize,
    /// Requested page
    pub current_page: usize,
    /// Last non-empty page (1 when there are no items)
    pub last_page: usize,
    /// Whether pages follow the current one
    pub has_more_pages: bool,
    /// Archive the page was read from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

impl<T> PaginatedResult<T> {
    /// Cuts one page out of a fully sorted item list.
    ///
    /// Pages past the end yield no data but keep the totals.
    #[must_use]
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let per_page = request.per_page;
        let last_page = total.div_ceil(per_page).max(1);
        let start = (request.page - 1).saturating_mul(per_page);

        let data: Vec<T> = if start >= total {
            Vec::new()
        } else {
            items.into_iter().skip(start).take(per_page).collect()
        };

        Self {
            data,
            total,
            per_page,
            current_page: request.page,
            last_page,
            has_more_pages: request.page < last_page,
            archive: None,
        }
    }

    /// Tags the result with the archive it was read from.
    #[must_use]
    pub fn with_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = Some(archive.into());
        self
    }
}

/// Metadata about one monthly archive on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Archive file name
    pub name: String,
    /// Compressed size in bytes
    pub size: u64,
    /// Creation time, or last modification where the platform lacks it
    pub created_at: DateTime<Utc>,
}

/// One daily file moved into an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedFile {
    /// Daily file name
    pub from: String,
    /// Archive file name
    pub to: String,
    /// Archive size after the move
    pub size: u64,
}

/// Outcome of one compaction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// Files moved into archives
    pub archived: Vec<ArchivedFile>,
    /// Per-file failure descriptions
    pub errors: Vec<String>,
    /// Set when the run stopped early on request
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl ArchiveReport {
    /// Returns true if nothing was archived and nothing failed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.archived.is_empty() && self.errors.is_empty()
    }
}

/// Aggregate counters over active logs and archives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Parsed records in active daily files
    pub active_count: usize,
    /// Active daily files
    pub active_files: usize,
    /// Archives on disk
    pub archived_count: usize,
    /// Total archive size in bytes
    pub archived_size: u64,
    /// Active record count per level
    pub level_distribution: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use test_case::test_case;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap_or_default()
    }

    // ===========================================
    // LogLevel Tests
    // ===========================================

    #[test_case("DEBUG", LogLevel::Debug)]
    #[test_case("INFO", LogLevel::Info)]
    #[test_case("NOTICE", LogLevel::Notice)]
    #[test_case("WARNING", LogLevel::Warning)]
    #[test_case("ERROR", LogLevel::Error)]
    #[test_case("CRITICAL", LogLevel::Critical)]
    fn known_levels_parse(raw: &str, expected: LogLevel) {
        let level = LogLevel::parse(raw);
        assert_eq!(level, expected);
        assert_eq!(level.as_str(), raw);
    }

    #[test]
    fn unknown_levels_are_preserved() {
        let level = LogLevel::parse("EMERGENCY");
        assert!(level.is_other());
        assert_eq!(level.as_str(), "EMERGENCY");

        let level = LogLevel::parse("info");
        assert_eq!(level, LogLevel::Other("info".to_string()));
    }

    #[test]
    fn level_serializes_as_line_text() {
        let json = serde_json::to_string(&LogLevel::Warning).map_err(|e| e.to_string());
        assert_eq!(json, Ok("\"WARNING\"".to_string()));

        let level: std::result::Result<LogLevel, _> = serde_json::from_str("\"ALERT\"");
        assert_eq!(level.ok(), Some(LogLevel::Other("ALERT".to_string())));
    }

    // ===========================================
    // RecordId Tests
    // ===========================================

    #[test]
    fn record_id_is_deterministic() {
        let a = RecordId::derive(&at(10, 0, 0), "login failed");
        let b = RecordId::derive(&at(10, 0, 0), "login failed");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn record_id_depends_on_time_and_message() {
        let base = RecordId::derive(&at(10, 0, 0), "login failed");
        assert_ne!(base, RecordId::derive(&at(10, 0, 1), "login failed"));
        assert_ne!(base, RecordId::derive(&at(10, 0, 0), "login ok"));
    }

    #[test]
    fn record_serializes_datetime_in_line_format() {
        let record = LogRecord {
            id: RecordId::derive(&at(8, 30, 5), "hello"),
            datetime: at(8, 30, 5),
            environment: "production".to_string(),
            level: LogLevel::Info,
            message: "hello".to_string(),
            context: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(json["datetime"], "2025-01-15 08:30:05");
        assert_eq!(json["level"], "INFO");

        let back: std::result::Result<LogRecord, _> = serde_json::from_value(json);
        assert_eq!(back.ok(), Some(record));
    }

    // ===========================================
    // Pagination Tests
    // ===========================================

    #[test]
    fn page_request_rejects_zero() {
        assert!(PageRequest::new(0, 1).is_err());
        assert!(PageRequest::new(25, 0).is_err());
        assert!(PageRequest::new(25, 1).is_ok());
    }

    #[test_case(10, 3, 1, 3, true ; "first page")]
    #[test_case(10, 3, 4, 1, false ; "short last page")]
    #[test_case(10, 3, 5, 0, false ; "past the end")]
    #[test_case(0, 25, 1, 0, false ; "empty set")]
    #[test_case(25, 25, 1, 25, false ; "exact fit")]
    fn paginate_slices(total: usize, per_page: usize, page: usize, len: usize, more: bool) {
        let items: Vec<usize> = (0..total).collect();
        let request = PageRequest::new(per_page, page).unwrap_or(PageRequest { per_page: 1, page: 1 });
        let result = PaginatedResult::paginate(items, request);

        assert_eq!(result.data.len(), len);
        assert_eq!(result.total, total);
        assert_eq!(result.per_page, per_page);
        assert_eq!(result.current_page, page);
        assert_eq!(result.has_more_pages, more);
    }

    #[test]
    fn paginate_last_page_is_at_least_one() {
        let result = PaginatedResult::<u8>::paginate(Vec::new(), PageRequest { per_page: 25, page: 1 });
        assert_eq!(result.last_page, 1);
    }

    #[test]
    fn paginate_keeps_order() {
        let items: Vec<usize> = (0..10).collect();
        let result = PaginatedResult::paginate(items, PageRequest { per_page: 4, page: 2 });
        assert_eq!(result.data, vec![4, 5, 6, 7]);
        assert_eq!(result.last_page, 3);
    }

    #[test]
    fn archive_field_is_omitted_unless_set() {
        let plain = PaginatedResult::<u8>::paginate(Vec::new(), PageRequest { per_page: 1, page: 1 });
        let json = serde_json::to_value(&plain).unwrap_or_default();
        assert!(json.get("archive").is_none());

        let tagged = plain.with_archive("security-logs-2025-01.zip");
        let json = serde_json::to_value(&tagged).unwrap_or_default();
        assert_eq!(json["archive"], "security-logs-2025-01.zip");
    }

    #[test]
    fn report_noop_and_cancelled_flag() {
        let report = ArchiveReport::default();
        assert!(report.is_noop());
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert!(json.get("cancelled").is_none());

        let report = ArchiveReport {
            cancelled: true,
            ..ArchiveReport::default()
        };
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert_eq!(json["cancelled"], true);
    }
}
