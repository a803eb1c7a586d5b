//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::lock::LockConfig;

/// Configuration for the security log engine.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding the daily files.
    pub log_root: PathBuf,
    /// Archive directory name, relative to `log_root`.
    pub archive_dir_name: String,
    /// Page size used when the caller does not pick one.
    pub default_per_page: usize,
    /// Largest page size a caller may request.
    pub max_per_page: usize,
    /// How long an archival run waits for a busy archive.
    #[serde(with = "duration_secs")]
    pub lock_timeout: Duration,
    /// Age after which a lock file whose owner cannot be checked is
    /// considered abandoned.
    #[serde(with = "duration_secs")]
    pub stale_lock_after: Duration,
    /// Delay between lock attempts.
    #[serde(with = "duration_millis")]
    pub lock_poll_interval: Duration,
    /// Whether completed moves are recorded in the manifest.
    pub write_manifest: bool,
    /// Delay between scheduled archival runs.
    #[serde(with = "duration_secs")]
    pub schedule_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("storage/logs"),
            archive_dir_name: "archived".to_string(),
            default_per_page: 25,
            max_per_page: 500,
            lock_timeout: Duration::from_secs(30),
            stale_lock_after: Duration::from_secs(10 * 60),
            lock_poll_interval: Duration::from_millis(50),
            write_manifest: true,
            schedule_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    /// Creates a config with the given log root.
    #[must_use]
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            ..Default::default()
        }
    }

    /// Loads a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the log root.
    #[must_use]
    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = log_root.into();
        self
    }

    /// Sets the lock timeout.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Enables or disables the manifest.
    #[must_use]
    pub const fn with_manifest(mut self, enabled: bool) -> Self {
        self.write_manifest = enabled;
        self
    }

    /// Sets the schedule interval.
    #[must_use]
    pub const fn with_schedule_interval(mut self, interval: Duration) -> Self {
        self.schedule_interval = interval;
        self
    }

    /// Checks the config for inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.log_root.as_os_str().is_empty() {
            return Err(LogError::InvalidConfig("log_root is empty".to_string()));
        }
        let dir_name = Path::new(&self.archive_dir_name);
        if self.archive_dir_name.is_empty()
            || dir_name.components().count() != 1
            || dir_name.file_name().is_none()
        {
            return Err(LogError::InvalidConfig(format!(
                "archive_dir_name must be a single directory name, got {:?}",
                self.archive_dir_name
            )));
        }
        if self.default_per_page == 0 || self.max_per_page == 0 {
            return Err(LogError::InvalidConfig("page sizes must be at least 1".to_string()));
        }
        if self.default_per_page > self.max_per_page {
            return Err(LogError::InvalidConfig(format!(
                "default_per_page {} exceeds max_per_page {}",
                self.default_per_page, self.max_per_page
            )));
        }
        if self.lock_poll_interval.is_zero() {
            return Err(LogError::InvalidConfig("lock_poll_interval must be positive".to_string()));
        }
        if self.schedule_interval.is_zero() {
            return Err(LogError::InvalidConfig("schedule_interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Directory holding the monthly archives.
    #[must_use]
    pub fn archive_dir(&self) -> PathBuf {
        self.log_root.join(&self.archive_dir_name)
    }

    /// Lock settings derived from this config.
    #[must_use]
    pub const fn lock_config(&self) -> LockConfig {
        LockConfig {
            timeout: self.lock_timeout,
            stale_after: self.stale_lock_after,
            poll_interval: self.lock_poll_interval,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
