//! Mutual exclusion for archive writers.
//!
//! Two layers guard each archive path:
//! - an in-process registry, so threads sharing an [`ArchiveLocks`] queue up
//!   instead of racing for the lock file;
//! - a `<archive>.lock` file created with `create_new`, so separate
//!   processes (scheduler and manual trigger) exclude each other.
//!
//! The lock file holds a JSON owner record (pid, a per-acquisition token and
//! the acquisition time). A lock is abandoned once its owning process is gone.
//! Where process liveness cannot be checked, or the record is unreadable, a
//! lock file older than the configured stale age counts as abandoned instead.
//! A guard only ever removes a lock file that still carries its own token.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LogError, Result};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Timing knobs for archive locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// How long to wait for a busy archive.
    pub timeout: Duration,
    /// Age after which a lock file whose owner cannot be checked is
    /// considered abandoned.
    pub stale_after: Duration,
    /// Delay between attempts to create the lock file.
    pub poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            stale_after: Duration::from_secs(10 * 60),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Contents of a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockOwner {
    pid: u32,
    token: String,
    acquired_at: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            token: new_token(),
            acquired_at: Utc::now(),
        }
    }

    fn parse(contents: &str) -> Option<Self> {
        serde_json::from_str(contents.trim()).ok()
    }
}

/// Registry of archive paths currently being written.
#[derive(Debug)]
pub struct ArchiveLocks {
    config: LockConfig,
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl Default for ArchiveLocks {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

impl ArchiveLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Acquires exclusive write access to `archive`, blocking up to the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::LockTimeout`] if the archive stays busy, or an I/O
    /// error if the lock file cannot be created.
    pub fn acquire(&self, archive: &Path) -> Result<ArchiveLockGuard<'_>> {
        let deadline = Instant::now() + self.config.timeout;

        {
            let mut held = self.held.lock();
            while held.contains(archive) {
                if self.released.wait_until(&mut held, deadline).timed_out()
                    && held.contains(archive)
                {
                    return Err(LogError::LockTimeout(archive.to_path_buf()));
                }
            }
            held.insert(archive.to_path_buf());
        }

        let lock_path = lock_file_path(archive);
        let token = match self.create_lock_file(&lock_path, deadline) {
            Ok(token) => token,
            Err(e) => {
                self.release(archive);
                return Err(match e {
                    LogError::LockTimeout(_) => LogError::LockTimeout(archive.to_path_buf()),
                    other => other,
                });
            }
        };

        debug!(archive = %archive.display(), "archive lock acquired");
        Ok(ArchiveLockGuard {
            locks: self,
            archive: archive.to_path_buf(),
            lock_path,
            token,
        })
    }

    #[cfg(test)]
    fn is_held(&self, archive: &Path) -> bool {
        self.held.lock().contains(archive)
    }

    fn create_lock_file(&self, lock_path: &Path, deadline: Instant) -> Result<String> {
        loop {
            match OpenOptions::new().write(true).create_new(true).open(lock_path) {
                Ok(mut file) => {
                    let owner = LockOwner::current();
                    let written = serde_json::to_string(&owner)
                        .map_err(LogError::from)
                        .and_then(|json| {
                            writeln!(file, "{json}")?;
                            file.sync_all()?;
                            Ok(())
                        });
                    if let Err(e) = written {
                        drop(file);
                        let _ = fs::remove_file(lock_path);
                        return Err(e);
                    }
                    return Ok(owner.token);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match fs::read_to_string(lock_path) {
                        Ok(contents) if self.is_abandoned(lock_path, &contents) => {
                            take_over(lock_path, &contents)?;
                            continue;
                        }
                        Ok(_) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    }
                    if Instant::now() >= deadline {
                        return Err(LogError::LockTimeout(lock_path.to_path_buf()));
                    }
                    std::thread::sleep(self.config.poll_interval);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn is_abandoned(&self, lock_path: &Path, contents: &str) -> bool {
        let owner_alive = LockOwner::parse(contents).and_then(|owner| process_alive(owner.pid));
        match owner_alive {
            Some(alive) => !alive,
            None => self.is_older_than_stale_age(lock_path),
        }
    }

    fn is_older_than_stale_age(&self, lock_path: &Path) -> bool {
        fs::metadata(lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.config.stale_after)
    }

    fn release(&self, archive: &Path) {
        self.held.lock().remove(archive);
        self.released.notify_all();
    }
}

/// Exclusive write access to one archive; released on drop.
#[derive(Debug)]
pub struct ArchiveLockGuard<'a> {
    locks: &'a ArchiveLocks,
    archive: PathBuf,
    lock_path: PathBuf,
    token: String,
}

impl Drop for ArchiveLockGuard<'_> {
    fn drop(&mut self) {
        match fs::read_to_string(&self.lock_path) {
            Ok(contents)
                if LockOwner::parse(&contents).is_some_and(|owner| owner.token == self.token) =>
            {
                if let Err(e) = fs::remove_file(&self.lock_path) {
                    if e.kind() != ErrorKind::NotFound {
                        warn!(lock = %self.lock_path.display(), error = %e, "failed to remove archive lock");
                    }
                }
            }
            Ok(_) => {
                warn!(lock = %self.lock_path.display(), "archive lock now belongs to another writer, leaving it");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(lock = %self.lock_path.display(), "archive lock file vanished while held");
            }
            Err(e) => {
                warn!(lock = %self.lock_path.display(), error = %e, "failed to read archive lock");
            }
        }
        self.locks.release(&self.archive);
        debug!(archive = %self.archive.display(), "archive lock released");
    }
}

/// Path of the lock file guarding `archive`.
#[must_use]
pub fn lock_file_path(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".lock");
    archive.with_file_name(name)
}

/// Removes an abandoned lock file whose contents were `judged`.
///
/// The file is first renamed to a private name, so of several writers that
/// judged the same file only one moves it. If what got moved is no longer
/// the judged file, a new owner replaced it in between and its lock is
/// linked back into place.
fn take_over(lock_path: &Path, judged: &str) -> Result<()> {
    let mut parked_name = lock_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    parked_name.push(format!(".{}.stale", new_token()));
    let parked = lock_path.with_file_name(parked_name);

    match fs::rename(lock_path, &parked) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let unchanged = fs::read_to_string(&parked).is_ok_and(|now| now == judged);
    if unchanged {
        warn!(lock = %lock_path.display(), "removed abandoned archive lock");
    } else if let Err(e) = fs::hard_link(&parked, lock_path) {
        warn!(lock = %lock_path.display(), error = %e, "could not restore replaced archive lock");
    }
    if let Err(e) = fs::remove_file(&parked) {
        if e.kind() != ErrorKind::NotFound {
            warn!(lock = %parked.display(), error = %e, "failed to remove parked archive lock");
        }
    }
    Ok(())
}

/// Whether `pid` is a running process, or `None` where that cannot be told.
fn process_alive(pid: u32) -> Option<bool> {
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        return None;
    }
    Some(proc_root.join(pid.to_string()).exists())
}

fn new_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&NEXT_TOKEN.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}
