//! Compaction of past-month daily files into monthly archives.
//!
//! A month is moved in four steps, all under that archive's lock:
//!
//! 1. stage: copy the existing archive (or start an empty one) to
//!    `<archive>.tmp` and append the month's pending files to the copy;
//! 2. verify: finish and sync the copy, reopen it and check every new entry;
//! 3. commit: rename the copy over the archive;
//! 4. delete the sources that are now safely inside the archive.
//!
//! A failure before step 3 leaves the previous archive and every source file
//! untouched, so the next run retries. Failures are collected per file and
//! never stop other months from being processed.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::active::{scan_daily_files, DailyFile};
use crate::error::{LogError, Result};
use crate::lock::ArchiveLocks;
use crate::manifest::{Manifest, ManifestEntry};
use crate::naming::MonthKey;
use crate::types::{ArchiveReport, ArchivedFile};

/// Daily files of one month that survived staging.
struct Staged<'a> {
    /// Sources whose content is in the archive and may be deleted
    ready: Vec<&'a DailyFile>,
    /// Per-file problems; those sources are kept
    failures: Vec<String>,
}

/// Moves daily files of past months into monthly archives.
#[derive(Debug, Clone)]
pub struct ArchiveCompactor {
    log_root: PathBuf,
    archive_dir: PathBuf,
    locks: Arc<ArchiveLocks>,
    manifest: Option<Manifest>,
}

impl ArchiveCompactor {
    /// Creates a compactor reading daily files from `log_root` and writing
    /// archives into `archive_dir`.
    #[must_use]
    pub fn new(
        log_root: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        locks: Arc<ArchiveLocks>,
    ) -> Self {
        Self {
            log_root: log_root.into(),
            archive_dir: archive_dir.into(),
            locks,
            manifest: None,
        }
    }

    /// Records every completed move in `manifest`.
    #[must_use]
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Archives every daily file outside the current local month.
    #[must_use]
    pub fn archive_old_logs(&self) -> ArchiveReport {
        self.archive_old_logs_with(Local::now().date_naive(), &CancellationToken::new())
    }

    /// Archives every daily file whose month differs from `today`'s.
    ///
    /// `cancel` is checked before each month; a cancelled run returns what
    /// it completed so far.
    #[must_use]
    pub fn archive_old_logs_with(&self, today: NaiveDate, cancel: &CancellationToken) -> ArchiveReport {
        let mut report = ArchiveReport::default();
        let current = MonthKey::of(today);

        let files = match scan_daily_files(&self.log_root) {
            Ok(files) => files,
            Err(e) => {
                warn!(log_root = %self.log_root.display(), error = %e, "cannot list daily files");
                report.errors.push(format!("cannot list {}: {e}", self.log_root.display()));
                return report;
            }
        };

        let months = group_by_month(files, current);
        if months.is_empty() {
            debug!(month = %current, "nothing to archive");
            return report;
        }

        if let Err(e) = fs::create_dir_all(&self.archive_dir) {
            let e = LogError::from(e);
            for (_, files) in &months {
                fail_all(&mut report, files, &e);
            }
            return report;
        }

        for (month, files) in &months {
            if cancel.is_cancelled() {
                info!(month = %month, "archival cancelled");
                report.cancelled = true;
                break;
            }
            self.compact_month(*month, files, &mut report);
        }

        info!(
            archived = report.archived.len(),
            errors = report.errors.len(),
            "archival run finished"
        );
        report
    }

    fn compact_month(&self, month: MonthKey, files: &[DailyFile], report: &mut ArchiveReport) {
        let archive_name = month.archive_name();
        let archive_path = self.archive_dir.join(&archive_name);

        let _guard = match self.locks.acquire(&archive_path) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(archive = %archive_name, error = %e, "archive is busy");
                fail_all(report, files, &e);
                return;
            }
        };

        let staging_path = staging_path(&archive_path);
        let staged = match stage(&archive_name, &archive_path, &staging_path, files) {
            Ok(staged) => staged,
            Err(e) => {
                let _ = fs::remove_file(&staging_path);
                warn!(archive = %archive_name, error = %e, "failed to update archive");
                fail_all(report, files, &e);
                return;
            }
        };
        report.errors.extend(staged.failures);

        let size = match fs::metadata(&archive_path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(archive = %archive_name, error = %e, "cannot stat archive");
                0
            }
        };

        for file in staged.ready {
            match fs::remove_file(&file.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(file = %file.name, error = %e, "archived source could not be removed");
                    report.errors.push(format!(
                        "{}: archived into {archive_name} but source could not be removed: {e}",
                        file.name
                    ));
                    continue;
                }
            }

            info!(file = %file.name, archive = %archive_name, size, "daily log archived");
            self.record(file, &archive_name, size);
            report.archived.push(ArchivedFile {
                from: file.name.to_string(),
                to: archive_name.clone(),
                size,
            });
        }
    }

    fn record(&self, file: &DailyFile, archive_name: &str, size: u64) {
        let Some(manifest) = &self.manifest else {
            return;
        };
        let entry = ManifestEntry {
            file: file.name.to_string(),
            archive: archive_name.to_string(),
            size,
            archived_at: Utc::now(),
        };
        if let Err(e) = manifest.append(&entry) {
            warn!(file = %file.name, error = %e, "failed to update archive manifest");
        }
    }
}

/// Groups files by month, dropping the current month. Months come out in
/// chronological order, files in date order.
fn group_by_month(files: Vec<DailyFile>, current: MonthKey) -> Vec<(MonthKey, Vec<DailyFile>)> {
    let mut months: Vec<(MonthKey, Vec<DailyFile>)> = Vec::new();
    for file in files {
        let month = file.name.month();
        if month == current {
            debug!(file = %file.name, "skipping current month");
            continue;
        }
        match months.iter_mut().find(|(m, _)| *m == month) {
            Some((_, group)) => group.push(file),
            None => months.push((month, vec![file])),
        }
    }
    months.sort_by_key(|(month, _)| *month);
    months
}

fn fail_all(report: &mut ArchiveReport, files: &[DailyFile], error: &LogError) {
    for file in files {
        report.errors.push(format!("{}: {error}", file.name));
    }
}

fn staging_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path
        .file_name()
        .map(std::ffi::OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    archive_path.with_file_name(name)
}

fn entry_options(len: usize) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .large_file(len as u64 >= u64::from(u32::MAX))
}

/// Builds the updated archive at `staging_path` and renames it into place.
fn stage<'a>(
    archive_name: &str,
    archive_path: &Path,
    staging_path: &Path,
    files: &'a [DailyFile],
) -> Result<Staged<'a>> {
    // Leftover from an interrupted run; the lock is held, so it is ours.
    match fs::remove_file(staging_path) {
        Ok(()) => debug!(archive = %archive_name, "removed leftover staging file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let open_failed = |e: ZipError| LogError::ArchiveOpen {
        archive: archive_name.to_string(),
        reason: e.to_string(),
    };

    let exists = match fs::metadata(archive_path) {
        Ok(_) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    let (mut writer, mut existing) = if exists {
        let existing = ZipArchive::new(File::open(archive_path)?).map_err(open_failed)?;
        fs::copy(archive_path, staging_path)?;
        let copy = OpenOptions::new().read(true).write(true).open(staging_path)?;
        (ZipWriter::new_append(copy).map_err(open_failed)?, Some(existing))
    } else {
        (ZipWriter::new(File::create(staging_path)?), None)
    };

    let mut staged = Staged {
        ready: Vec::new(),
        failures: Vec::new(),
    };
    let mut written: Vec<(&DailyFile, u64)> = Vec::new();

    for file in files {
        let bytes = match fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %file.name, "daily file already moved");
                continue;
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "cannot read daily file");
                staged.failures.push(format!("{}: {e}", file.name));
                continue;
            }
        };

        if let Some(archive) = existing.as_mut() {
            if let Some(stored) = read_entry(archive, file.name.as_str())? {
                if stored == bytes {
                    debug!(file = %file.name, "already present in archive");
                    staged.ready.push(file);
                } else {
                    warn!(file = %file.name, archive = %archive_name, "archive holds a different copy");
                    staged.failures.push(format!(
                        "{}: {archive_name} already holds a different copy of this file",
                        file.name
                    ));
                }
                continue;
            }
        }

        writer.start_file(file.name.as_str(), entry_options(bytes.len()))?;
        writer.write_all(&bytes)?;
        written.push((file, bytes.len() as u64));
    }

    if written.is_empty() {
        drop(writer);
        fs::remove_file(staging_path)?;
        return Ok(staged);
    }

    let finished = writer.finish()?;
    finished.sync_all()?;
    drop(finished);

    verify(staging_path, &written)?;
    fs::rename(staging_path, archive_path)?;
    debug!(archive = %archive_name, entries = written.len(), "archive committed");

    staged.ready.extend(written.into_iter().map(|(file, _)| file));
    Ok(staged)
}

/// Reads an entry's bytes, or `None` if the archive has no such entry.
fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reopens the staged archive and checks every new entry is listed with
/// the expected size.
fn verify(staging_path: &Path, written: &[(&DailyFile, u64)]) -> Result<()> {
    let mut archive = ZipArchive::new(File::open(staging_path)?)?;
    for (file, len) in written {
        let entry = archive.by_name(file.name.as_str())?;
        if entry.size() != *len {
            return Err(LogError::ArchiveWrite {
                file: file.name.to_string(),
                reason: format!("staged entry holds {} bytes, source has {len}", entry.size()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{lock_file_path, LockConfig};
    use std::time::Duration;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    fn lines(day: &str, count: usize) -> String {
        (0..count)
            .map(|i| format!("[{day} 10:{i:02}:00] production.INFO: event {i}\n"))
            .collect()
    }

    struct Fixture {
        dir: TempDir,
        compactor: ArchiveCompactor,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("create temp dir");
            let locks = Arc::new(ArchiveLocks::new(LockConfig {
                timeout: Duration::from_millis(100),
                stale_after: Duration::from_secs(600),
                poll_interval: Duration::from_millis(5),
            }));
            let compactor = ArchiveCompactor::new(dir.path(), dir.path().join("archived"), locks)
                .with_manifest(Manifest::in_dir(&dir.path().join("archived")));
            Self { dir, compactor }
        }

        fn daily(&self, day: &str, count: usize) -> PathBuf {
            let path = self.dir.path().join(format!("security-{day}.log"));
            fs::write(&path, lines(day, count)).expect("write daily file");
            path
        }

        fn archive(&self, name: &str) -> PathBuf {
            self.dir.path().join("archived").join(name)
        }

        fn run(&self, today: NaiveDate) -> ArchiveReport {
            self.compactor
                .archive_old_logs_with(today, &CancellationToken::new())
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).expect("open")).expect("zip");
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn archives_only_past_months() {
        let fx = Fixture::new();
        let january = fx.daily("2025-01-15", 10);
        let february = fx.daily("2025-02-01", 5);

        let report = fx.run(date(2025, 2, 10));

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.archived.len(), 1);
        assert_eq!(report.archived[0].from, "security-2025-01-15.log");
        assert_eq!(report.archived[0].to, "security-logs-2025-01.zip");
        assert!(report.archived[0].size > 0);
        assert!(!january.exists());
        assert!(february.exists());
        assert_eq!(
            entry_names(&fx.archive("security-logs-2025-01.zip")),
            vec!["security-2025-01-15.log"]
        );
    }

    #[test]
    fn groups_several_months_into_separate_archives() {
        let fx = Fixture::new();
        fx.daily("2024-12-30", 2);
        fx.daily("2024-12-31", 2);
        fx.daily("2025-01-02", 3);

        let report = fx.run(date(2025, 2, 1));

        assert_eq!(report.archived.len(), 3);
        assert_eq!(
            entry_names(&fx.archive("security-logs-2024-12.zip")),
            vec!["security-2024-12-30.log", "security-2024-12-31.log"]
        );
        assert_eq!(
            entry_names(&fx.archive("security-logs-2025-01.zip")),
            vec!["security-2025-01-02.log"]
        );
        // Same month, same resulting size.
        assert_eq!(report.archived[0].size, report.archived[1].size);
    }

    #[test]
    fn second_run_is_a_noop() {
        let fx = Fixture::new();
        fx.daily("2025-01-15", 3);

        let first = fx.run(date(2025, 2, 1));
        assert_eq!(first.archived.len(), 1);

        let second = fx.run(date(2025, 2, 1));
        assert!(second.is_noop());
    }

    #[test]
    fn late_file_is_appended_to_existing_archive() {
        let fx = Fixture::new();
        fx.daily("2025-01-15", 3);
        let first = fx.run(date(2025, 2, 1));
        assert_eq!(first.archived.len(), 1);
        let size_before = fs::metadata(fx.archive("security-logs-2025-01.zip"))
            .expect("stat")
            .len();

        fx.daily("2025-01-20", 4);
        let report = fx.run(date(2025, 2, 2));

        assert_eq!(report.archived.len(), 1);
        assert!(report.archived[0].size > size_before);
        assert_eq!(
            entry_names(&fx.archive("security-logs-2025-01.zip")),
            vec!["security-2025-01-15.log", "security-2025-01-20.log"]
        );
    }

    #[test]
    fn identical_copy_already_archived_is_cleaned_up() {
        let fx = Fixture::new();
        let source = fx.daily("2025-01-15", 3);
        let content = fs::read(&source).expect("read");
        let first = fx.run(date(2025, 2, 1));
        assert_eq!(first.archived.len(), 1);

        // Simulate a run that archived but crashed before deleting.
        fs::write(&source, &content).expect("restore");
        let report = fx.run(date(2025, 2, 1));

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.archived.len(), 1);
        assert!(!source.exists());
        assert_eq!(
            entry_names(&fx.archive("security-logs-2025-01.zip")),
            vec!["security-2025-01-15.log"]
        );
    }

    #[test]
    fn different_copy_already_archived_is_kept() {
        let fx = Fixture::new();
        let source = fx.daily("2025-01-15", 3);
        let first = fx.run(date(2025, 2, 1));
        assert_eq!(first.archived.len(), 1);

        fs::write(&source, lines("2025-01-15", 7)).expect("rewrite");
        let report = fx.run(date(2025, 2, 1));

        assert!(report.archived.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("different copy"));
        assert!(source.exists());
    }

    #[test]
    fn corrupt_archive_fails_every_pending_file_and_is_preserved() {
        let fx = Fixture::new();
        let a = fx.daily("2025-01-15", 3);
        let b = fx.daily("2025-01-16", 3);
        let archive = fx.archive("security-logs-2025-01.zip");
        fs::create_dir_all(archive.parent().expect("parent")).expect("mkdir");
        fs::write(&archive, b"not a zip").expect("write garbage");

        let report = fx.run(date(2025, 2, 1));

        assert!(report.archived.is_empty());
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.contains("cannot open archive")));
        assert!(a.exists() && b.exists());
        assert_eq!(fs::read(&archive).expect("read"), b"not a zip");
        assert!(!staging_path(&archive).exists());
    }

    #[test]
    fn failure_in_one_month_does_not_block_others() {
        let fx = Fixture::new();
        fx.daily("2024-12-31", 2);
        let january = fx.daily("2025-01-15", 2);
        let bad = fx.archive("security-logs-2024-12.zip");
        fs::create_dir_all(bad.parent().expect("parent")).expect("mkdir");
        fs::write(&bad, b"garbage").expect("write");

        let report = fx.run(date(2025, 2, 1));

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.archived.len(), 1);
        assert_eq!(report.archived[0].from, "security-2025-01-15.log");
        assert!(!january.exists());
    }

    #[test]
    fn busy_archive_is_reported_and_retried_later() {
        let fx = Fixture::new();
        let source = fx.daily("2025-01-15", 2);
        let archive = fx.archive("security-logs-2025-01.zip");
        fs::create_dir_all(archive.parent().expect("parent")).expect("mkdir");
        fs::write(lock_file_path(&archive), "1\n").expect("foreign lock");

        let report = fx.run(date(2025, 2, 1));
        assert!(report.archived.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("timed out"));
        assert!(source.exists());

        fs::remove_file(lock_file_path(&archive)).expect("unlock");
        let report = fx.run(date(2025, 2, 1));
        assert_eq!(report.archived.len(), 1);
        assert!(!source.exists());
    }

    #[test]
    fn leftover_staging_file_is_replaced() {
        let fx = Fixture::new();
        fx.daily("2025-01-15", 2);
        let archive = fx.archive("security-logs-2025-01.zip");
        fs::create_dir_all(archive.parent().expect("parent")).expect("mkdir");
        fs::write(staging_path(&archive), b"half written").expect("write");

        let report = fx.run(date(2025, 2, 1));
        assert_eq!(report.archived.len(), 1);
        assert!(!staging_path(&archive).exists());
        assert_eq!(entry_names(&archive), vec!["security-2025-01-15.log"]);
    }

    #[test]
    fn cancelled_run_touches_nothing() {
        let fx = Fixture::new();
        let source = fx.daily("2025-01-15", 2);
        let token = CancellationToken::new();
        token.cancel();

        let report = fx.compactor.archive_old_logs_with(date(2025, 2, 1), &token);
        assert!(report.cancelled);
        assert!(report.archived.is_empty());
        assert!(source.exists());
    }

    #[test]
    fn manifest_records_moves() {
        let fx = Fixture::new();
        fx.daily("2025-01-15", 2);
        fx.daily("2025-01-16", 2);
        let report = fx.run(date(2025, 2, 1));
        assert_eq!(report.archived.len(), 2);

        let entries = Manifest::in_dir(&fx.dir.path().join("archived"))
            .read_all()
            .expect("read manifest");
        let files: Vec<&str> = entries.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["security-2025-01-15.log", "security-2025-01-16.log"]);
    }

    #[test]
    fn archived_content_matches_source_bytes() {
        let fx = Fixture::new();
        let source = fx.daily("2025-01-15", 10);
        let original = fs::read(&source).expect("read");
        let report = fx.run(date(2025, 2, 1));
        assert!(report.errors.is_empty(), "{:?}", report.errors);

        let mut archive =
            ZipArchive::new(File::open(fx.archive("security-logs-2025-01.zip")).expect("open"))
                .expect("zip");
        let stored = read_entry(&mut archive, "security-2025-01-15.log").expect("read entry");
        assert_eq!(stored, Some(original));
    }

    #[test]
    fn missing_log_root_is_a_noop() {
        let dir = TempDir::new().expect("create temp dir");
        let compactor = ArchiveCompactor::new(
            dir.path().join("missing"),
            dir.path().join("missing/archived"),
            Arc::new(ArchiveLocks::default()),
        );
        let report = compactor.archive_old_logs_with(date(2025, 2, 1), &CancellationToken::new());
        assert!(report.is_noop());
        assert!(!dir.path().join("missing").exists());
    }
}
