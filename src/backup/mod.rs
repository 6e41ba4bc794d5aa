//! Periodic, failure-isolated backups of the live store.

pub mod scheduler;
pub mod status;

pub use scheduler::{
    BackupScheduler, CycleReport, EXPORT_FILE_NAME, MIN_INTERVAL, SNAPSHOT_FILE_NAME,
};
pub use status::BackupStatus;
