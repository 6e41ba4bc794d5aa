//! Entry points the outside world calls. Each takes the shared [`AppState`]
//! and returns plain serialisable values; transport is the caller's concern.

use std::fs;
use std::io::Write;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::db::upload::{self, UploadError, INVALID_FORMAT_MESSAGE};
use crate::db::snapshot;
use crate::model::Period;
use crate::repo;
use crate::state::AppState;
use crate::sync::{self, ExportEnvelope, ImportOutcome, ImportRequest, SyncStatus};
use crate::time::{now_wire, to_wire};
use crate::{AppError, AppResult};

pub const SNAPSHOT_CONTENT_TYPE: &str = "application/x-sqlite3";
pub const RESTORE_SUCCESS_MESSAGE: &str = "Database restored successfully";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDownload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub success: bool,
    pub message: String,
}

impl RestoreOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            message: RESTORE_SUCCESS_MESSAGE.to_string(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatusReport {
    pub enabled: bool,
    #[serde(alias = "backup_path")]
    pub backup_directory: String,
    #[serde(alias = "last_backup_at")]
    pub last_backup_at: Option<String>,
}

/// Snapshot the live store into a throwaway file and hand back its bytes.
pub async fn download(state: &AppState) -> AppResult<SnapshotDownload> {
    let scratch = tempfile::Builder::new()
        .prefix("pennywise-download-")
        .tempdir()
        .map_err(|err| AppError::from(err).with_context("operation", "download_tempdir"))?;
    let path = scratch.path().join("snapshot.db");

    {
        let _guard = state.maintenance.begin_snapshot()?;
        snapshot::backup(&state.store, &path).await?;
    }
    let bytes = fs::read(&path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "read_download")
            .with_context("path", path.display().to_string())
    })?;

    Ok(SnapshotDownload {
        file_name: download_file_name(),
        content_type: SNAPSHOT_CONTENT_TYPE,
        bytes,
    })
}

pub fn download_file_name() -> String {
    format!("pennywise-backup-{}.db", Local::now().format("%Y-%m-%d"))
}

/// Validate an uploaded snapshot and, if it is a SQLite file, overwrite the
/// live store with it. Rejected uploads never touch the store.
pub async fn restore(state: &AppState, upload: &[u8]) -> RestoreOutcome {
    if let Err(err) = upload::validate_bytes(upload) {
        tracing::warn!(
            target: "pennywise",
            event = "restore_rejected",
            code = %err.code(),
            reason = %err,
            size = upload.len()
        );
        return match err {
            UploadError::TooLarge { .. } => RestoreOutcome::failed("Upload too large"),
            _ => RestoreOutcome::failed(INVALID_FORMAT_MESSAGE),
        };
    }

    let staged = match stage_upload(upload) {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(
                target: "pennywise",
                event = "restore_stage_failed",
                code = %err.code(),
                error = %err
            );
            return RestoreOutcome::failed("Failed to save upload");
        }
    };

    let result = match state.maintenance.begin_restore() {
        Ok(_guard) => snapshot::restore(&state.store, staged.path()).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => RestoreOutcome::ok(),
        Err(err) => {
            tracing::error!(
                target: "pennywise",
                event = "restore_failed",
                code = %err.code(),
                error = %err,
                context = ?err.context()
            );
            RestoreOutcome::failed(format!("Failed to restore backup: {}", err.message()))
        }
    }
}

fn stage_upload(upload: &[u8]) -> AppResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("pennywise-restore-")
        .suffix(".db")
        .tempfile()
        .map_err(|err| AppError::from(err).with_context("operation", "create_restore_tempfile"))?;
    file.write_all(upload)
        .and_then(|()| file.flush())
        .map_err(|err| AppError::from(err).with_context("operation", "write_restore_tempfile"))?;
    Ok(file)
}

pub fn status(state: &AppState) -> BackupStatusReport {
    BackupStatusReport {
        enabled: state.config.backups_enabled(),
        backup_directory: state
            .config
            .backup_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default(),
        last_backup_at: state.backup_status.get().map(|at| to_wire(&at)),
    }
}

pub async fn sync_status(state: &AppState) -> AppResult<SyncStatus> {
    Ok(SyncStatus {
        transaction_count: repo::count_active_transactions(state.store.pool()).await?,
        server_time: now_wire(),
    })
}

/// `period` is `"all"`, a four-digit year, or absent for the current year.
pub async fn sync_export(state: &AppState, period: Option<&str>) -> AppResult<ExportEnvelope> {
    let period = Period::from_param(period)?;
    sync::export(&state.store, period).await
}

pub async fn sync_import(state: &AppState, request: ImportRequest) -> AppResult<ImportOutcome> {
    sync::import(&state.store, &request.transactions).await
}
