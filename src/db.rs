use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Sqlite, SqlitePool};

use crate::{AppError, AppResult};

pub mod schema;
pub mod snapshot;
pub mod upload;

const MAX_CONNECTIONS: u32 = 8;
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The live store: a connection pool plus the file it points at.
///
/// Every request path and the backup scheduler share one `Store`. The pool
/// serves ordinary reads and writes; the snapshot engine opens its own
/// handles on `path` for page-level copies.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    path: Arc<PathBuf>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and bootstrap the
    /// schema.
    pub async fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                tracing::error!(
                    target: "pennywise",
                    error = %err,
                    event = "db_dir_create_failed",
                    path = %parent.display()
                );
                AppError::from(err)
                    .with_context("operation", "create_db_dir")
                    .with_context("path", parent.display().to_string())
            })?;
        }
        tracing::info!(target: "pennywise", event = "db_path", path = %path.display());

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .log_statements(log::LevelFilter::Off);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(opts)
            .await
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "open_pool")
                    .with_context("path", path.display().to_string())
            })?;

        schema::bootstrap(&pool).await?;
        log_effective_pragmas(&pool).await;

        Ok(Self {
            pool,
            path: Arc::new(path.to_path_buf()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn log_effective_pragmas(pool: &Pool<Sqlite>) {
    use tracing::{info, warn};

    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let fks: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    info!(
        target: "pennywise",
        event = "db_open",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0,
        foreign_keys = %fks.0
    );

    if !jm.0.eq_ignore_ascii_case("wal") {
        warn!(
            target: "pennywise",
            event = "db_open_warning",
            msg = "journal_mode != WAL; readers may block during snapshots"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_wal_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        let store = Store::open(&path).await.expect("open store");
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
        store.close().await;
    }

    #[tokio::test]
    async fn reopening_keeps_existing_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let store = Store::open(&path).await.unwrap();
        let (first,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(store.pool())
            .await
            .unwrap();
        store.close().await;

        let store = Store::open(&path).await.unwrap();
        let (second,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(first, second);
        store.close().await;
    }
}
