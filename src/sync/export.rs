use std::fs;
use std::path::Path;

use crate::db::Store;
use crate::model::Period;
use crate::repo;
use crate::sync::envelope::{ExportEnvelope, SyncCategory, SyncTransaction};
use crate::time::now_wire;
use crate::{AppError, AppResult};

/// Build a fresh envelope for `period`: live transactions in the period plus
/// the whole category catalog.
pub async fn export(store: &Store, period: Period) -> AppResult<ExportEnvelope> {
    let entries = repo::list_entries(store.pool(), &period).await?;
    let categories = repo::list_categories(store.pool()).await?;

    let envelope = ExportEnvelope {
        transactions: entries.into_iter().map(SyncTransaction::from).collect(),
        categories: categories.into_iter().map(SyncCategory::from).collect(),
        period,
        exported_at: now_wire(),
    };
    tracing::debug!(
        target: "pennywise",
        event = "sync_export",
        period = %envelope.period,
        transactions = envelope.transactions.len(),
        categories = envelope.categories.len()
    );
    Ok(envelope)
}

/// Export `period` and write it as pretty JSON to `path`, replacing any
/// previous file.
pub async fn export_to_file(store: &Store, period: Period, path: &Path) -> AppResult<ExportEnvelope> {
    let envelope = export(store, period).await?;
    let json = serde_json::to_vec_pretty(&envelope)
        .map_err(|err| AppError::from(err).with_context("operation", "encode_export"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "create_export_dir")
                .with_context("path", parent.display().to_string())
        })?;
    }
    fs::write(path, json).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "write_export")
            .with_context("path", path.display().to_string())
    })?;
    tracing::info!(
        target: "pennywise",
        event = "sync_export_written",
        path = %path.display(),
        transactions = envelope.transactions.len()
    );
    Ok(envelope)
}
