//! Page-level online copies between the live store and standalone files.
//!
//! Both directions use SQLite's backup API, so the live store stays open for
//! readers and writers while pages are copied. A snapshot taken while writes
//! land is still a consistent point-in-time image: SQLite restarts the copy
//! when the source changes underneath it.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rusqlite::backup::{Backup, StepResult};
use rusqlite::{Connection, OpenFlags};
use tokio::task;

use super::{Store, BUSY_TIMEOUT};
use crate::{AppError, AppResult};

const PARTIAL_SUFFIX: &str = ".partial";
/// Pages copied per step while taking a snapshot of the live store.
const PAGES_PER_STEP: i32 = 256;
const RETRY_PAUSE: Duration = Duration::from_millis(50);
/// Busy/locked steps tolerated before a copy gives up.
const MAX_CONTENDED_STEPS: u32 = 200;

/// Copy the live store into a standalone file at `destination`.
///
/// The copy lands in `<destination>.partial` first and is renamed over
/// `destination` once complete, so the fixed name always holds either the
/// previous snapshot or the new one. Runs on the blocking pool.
pub async fn backup(store: &Store, destination: &Path) -> AppResult<()> {
    let live = store.path().to_path_buf();
    let destination = destination.to_path_buf();
    task::spawn_blocking(move || backup_file(&live, &destination))
        .await
        .map_err(|err| {
            AppError::new("DB_SNAPSHOT/TASK", "Backup task panicked")
                .with_context("error", err.to_string())
        })?
}

/// Overwrite the live store's contents with the pages of `source`.
///
/// The caller must have validated `source` (see [`super::upload`]). The
/// overwrite happens in place: if the copy fails midway the live store may be
/// left partially written.
pub async fn restore(store: &Store, source: &Path) -> AppResult<()> {
    let live = store.path().to_path_buf();
    let source = source.to_path_buf();
    task::spawn_blocking(move || restore_file(&live, &source))
        .await
        .map_err(|err| {
            AppError::new("DB_SNAPSHOT/TASK", "Restore task panicked")
                .with_context("error", err.to_string())
        })?
}

pub(crate) fn backup_file(live: &Path, destination: &Path) -> AppResult<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "create_backup_dir")
                .with_context("path", parent.display().to_string())
        })?;
    }

    let partial = partial_path(destination);
    remove_if_exists(&partial).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "remove_stale_partial")
            .with_context("path", partial.display().to_string())
    })?;

    let result = copy_into_partial(live, &partial).and_then(|()| {
        fs::rename(&partial, destination).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "finalize_backup")
                .with_context("from", partial.display().to_string())
                .with_context("to", destination.display().to_string())
        })
    });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result?;

    tracing::info!(
        target: "pennywise",
        event = "db_snapshot_written",
        source = %live.display(),
        path = %destination.display()
    );
    Ok(())
}

fn copy_into_partial(live: &Path, partial: &Path) -> AppResult<()> {
    let src_flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI;
    let src_conn = Connection::open_with_flags(live, src_flags).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "open_source_db")
            .with_context("path", live.display().to_string())
    })?;
    src_conn
        .busy_timeout(BUSY_TIMEOUT)
        .map_err(|err| AppError::from(err).with_context("operation", "source_busy_timeout"))?;

    let mut dest_conn = Connection::open(partial).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "create_backup_db")
            .with_context("path", partial.display().to_string())
    })?;

    {
        let backup = Backup::new(&src_conn, &mut dest_conn)
            .map_err(|err| AppError::from(err).with_context("operation", "backup_init"))?;
        step_until_done(&backup, PAGES_PER_STEP, "backup_step")?;
    }

    // The copied header carries the live store's WAL flag; a snapshot must be
    // openable on its own, without -wal/-shm sidecars.
    dest_conn
        .execute_batch("PRAGMA journal_mode=DELETE;")
        .map_err(|err| AppError::from(err).with_context("operation", "backup_journal_mode"))?;

    dest_conn
        .close()
        .map_err(|(_, err)| AppError::from(err).with_context("operation", "close_backup_db"))?;
    src_conn
        .close()
        .map_err(|(_, err)| AppError::from(err).with_context("operation", "close_source_db"))?;
    Ok(())
}

pub(crate) fn restore_file(live: &Path, source: &Path) -> AppResult<()> {
    let src_flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI;
    let src_conn = Connection::open_with_flags(source, src_flags).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "open_restore_source")
            .with_context("path", source.display().to_string())
    })?;

    let mut live_conn = Connection::open(live).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "open_live_db")
            .with_context("path", live.display().to_string())
    })?;
    live_conn
        .busy_timeout(BUSY_TIMEOUT)
        .map_err(|err| AppError::from(err).with_context("operation", "live_busy_timeout"))?;

    {
        let backup = Backup::new(&src_conn, &mut live_conn)
            .map_err(|err| AppError::from(err).with_context("operation", "restore_init"))?;
        // One step over every page: the live store is overwritten under a
        // single write lock or not at all.
        step_until_done(&backup, -1, "restore_step")?;
    }

    live_conn
        .close()
        .map_err(|(_, err)| AppError::from(err).with_context("operation", "close_live_db"))?;
    src_conn
        .close()
        .map_err(|(_, err)| AppError::from(err).with_context("operation", "close_restore_source"))?;

    tracing::info!(
        target: "pennywise",
        event = "db_restored",
        source = %source.display(),
        path = %live.display()
    );
    Ok(())
}

/// Step the backup until SQLite reports every page copied. `Busy` and
/// `Locked` are retried after a short pause; the remaining pages are picked
/// up on the next step.
fn step_until_done(backup: &Backup<'_, '_>, pages: i32, operation: &str) -> AppResult<()> {
    let mut contended = 0_u32;
    loop {
        let step = backup
            .step(pages)
            .map_err(|err| AppError::from(err).with_context("operation", operation.to_string()))?;
        match step {
            StepResult::Done => return Ok(()),
            StepResult::More => continue,
            // Busy, Locked, or anything newer SQLite may report.
            contended_step => {
                contended += 1;
                if contended > MAX_CONTENDED_STEPS {
                    let progress = backup.progress();
                    return Err(AppError::new(
                        "DB_SNAPSHOT/CONTENDED",
                        "Database stayed locked while copying pages",
                    )
                    .with_context("operation", operation.to_string())
                    .with_context("remaining_pages", progress.remaining.to_string())
                    .with_context("page_count", progress.pagecount.to_string()));
                }
                tracing::debug!(
                    target: "pennywise",
                    event = "db_snapshot_retry",
                    operation,
                    step = ?contended_step,
                    attempt = contended
                );
                thread::sleep(RETRY_PAUSE);
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut os = OsString::from(destination.as_os_str());
    os.push(PARTIAL_SUFFIX);
    PathBuf::from(os)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
