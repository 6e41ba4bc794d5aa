use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use super::BackupStatus;
use crate::db::{snapshot, Store};
use crate::model::Period;
use crate::state::Maintenance;
use crate::sync;
use crate::AppError;

/// Fixed name of the database snapshot inside the backup directory.
pub const SNAPSHOT_FILE_NAME: &str = "pennywise.db";
/// Fixed name of the JSON export written next to it.
pub const EXPORT_FILE_NAME: &str = "pennywise.json";
/// Shortest gap between cycles; shorter requests, zero included, are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// What one cycle did. Each step is attempted regardless of the other.
#[derive(Debug)]
pub struct CycleReport {
    pub snapshot: Result<PathBuf, AppError>,
    pub export: Result<PathBuf, AppError>,
    /// Set only when both steps succeeded.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.completed_at.is_some()
    }
}

pub struct BackupScheduler {
    store: Store,
    status: Arc<BackupStatus>,
    maintenance: Maintenance,
    backup_dir: PathBuf,
}

impl BackupScheduler {
    pub fn new(
        store: Store,
        status: Arc<BackupStatus>,
        maintenance: Maintenance,
        backup_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            status,
            maintenance,
            backup_dir,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshot the store and write the JSON export. Failures are logged and
    /// reported, never propagated; the status only advances when both steps
    /// succeed.
    pub async fn run_cycle(&self) -> CycleReport {
        let snapshot_path = self.backup_dir.join(SNAPSHOT_FILE_NAME);
        let export_path = self.backup_dir.join(EXPORT_FILE_NAME);

        let snapshot = self.write_snapshot(&snapshot_path).await.map(|()| snapshot_path);
        if let Err(err) = &snapshot {
            tracing::error!(
                target: "pennywise",
                event = "backup_snapshot_failed",
                code = %err.code(),
                error = %err,
                context = ?err.context()
            );
        }

        let export = sync::export_to_file(&self.store, Period::All, &export_path)
            .await
            .map(|_| export_path);
        if let Err(err) = &export {
            tracing::error!(
                target: "pennywise",
                event = "backup_export_failed",
                code = %err.code(),
                error = %err,
                context = ?err.context()
            );
        }

        let completed_at = if snapshot.is_ok() && export.is_ok() {
            let now = Utc::now();
            self.status.set(now);
            tracing::info!(
                target: "pennywise",
                event = "backup_cycle_completed",
                dir = %self.backup_dir.display()
            );
            Some(now)
        } else {
            None
        };

        CycleReport {
            snapshot,
            export,
            completed_at,
        }
    }

    async fn write_snapshot(&self, destination: &Path) -> Result<(), AppError> {
        let _guard = self.maintenance.begin_snapshot()?;
        snapshot::backup(&self.store, destination).await
    }

    /// Run one cycle now and then one every `interval` until `shutdown`
    /// flips to `true` or its sender goes away.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let interval = interval.max(MIN_INTERVAL);
        tracing::info!(
            target: "pennywise",
            event = "backup_scheduler_started",
            dir = %self.backup_dir.display(),
            interval_secs = interval.as_secs()
        );
        if *shutdown.borrow_and_update() {
            return;
        }
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "pennywise", event = "backup_scheduler_stopped");
    }
}
