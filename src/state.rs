use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::backup::BackupStatus;
use crate::config::Config;
use crate::db::Store;
use crate::{AppError, AppResult};

pub const MAINTENANCE_ACTIVE_CODE: &str = "DB_MAINTENANCE_ACTIVE";

/// Everything a command needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub backup_status: Arc<BackupStatus>,
    pub maintenance: Maintenance,
}

impl AppState {
    pub async fn open(config: Config) -> AppResult<Self> {
        let store = Store::open(&config.db_path).await?;
        Ok(Self {
            config: Arc::new(config),
            store,
            backup_status: Arc::new(BackupStatus::new()),
            maintenance: Maintenance::default(),
        })
    }
}

/// Page-level copies of the live store. Any number of snapshots may read it
/// at once; a restore needs it to itself. Neither side waits: whoever finds
/// the other holding the lock fails with `DB_MAINTENANCE_ACTIVE`.
#[derive(Debug, Clone, Default)]
pub struct Maintenance {
    lock: Arc<RwLock<()>>,
}

pub type SnapshotGuard = OwnedRwLockReadGuard<()>;
pub type RestoreGuard = OwnedRwLockWriteGuard<()>;

impl Maintenance {
    pub fn begin_snapshot(&self) -> AppResult<SnapshotGuard> {
        self.lock
            .clone()
            .try_read_owned()
            .map_err(|_| busy("Database restore is running."))
    }

    pub fn begin_restore(&self) -> AppResult<RestoreGuard> {
        self.lock
            .clone()
            .try_write_owned()
            .map_err(|_| busy("A backup or restore is already running."))
    }
}

fn busy(message: &str) -> AppError {
    AppError::new(MAINTENANCE_ACTIVE_CODE, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_share_and_restore_excludes() {
        let maintenance = Maintenance::default();
        let first = maintenance.begin_snapshot().expect("first snapshot");
        let second = maintenance.begin_snapshot().expect("snapshots overlap");

        let err = maintenance.begin_restore().err().expect("restore refused");
        assert_eq!(err.code(), MAINTENANCE_ACTIVE_CODE);

        drop(first);
        drop(second);
        let restore = maintenance.begin_restore().expect("restore once snapshots finish");
        let err = maintenance.begin_snapshot().err().expect("snapshot refused");
        assert_eq!(err.code(), MAINTENANCE_ACTIVE_CODE);
        assert!(maintenance.begin_restore().is_err());

        drop(restore);
        assert!(maintenance.begin_snapshot().is_ok());
    }
}
