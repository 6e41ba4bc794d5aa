use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{AppError, AppResult};

pub const DB_ENV: &str = "PENNYWISE_DB";
pub const BACKUP_DIR_ENV: &str = "PENNYWISE_BACKUP_DIR";
pub const BACKUP_INTERVAL_ENV: &str = "PENNYWISE_BACKUP_INTERVAL_MINUTES";

pub const DB_FILE_NAME: &str = "pennywise.db";
const APP_DIR_NAME: &str = "pennywise";
const DEFAULT_BACKUP_INTERVAL_MINUTES: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// Backups are disabled when unset.
    pub backup_dir: Option<PathBuf>,
    pub backup_interval: Duration,
}

impl Config {
    /// Resolve configuration from the environment, falling back to the
    /// platform data directory for the database.
    pub fn from_env() -> AppResult<Self> {
        let db_path = match env::var_os(DB_ENV).filter(|value| !value.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };
        let backup_dir = env::var_os(BACKUP_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let backup_interval = interval_from_minutes(env::var(BACKUP_INTERVAL_ENV).ok().as_deref());

        Ok(Self {
            db_path,
            backup_dir,
            backup_interval,
        })
    }

    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }

    pub fn with_backup_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.backup_dir = dir;
        }
        self
    }

    pub fn backups_enabled(&self) -> bool {
        self.backup_dir.is_some()
    }
}

fn default_db_path() -> AppResult<PathBuf> {
    let base = match dirs::data_dir() {
        Some(dir) => dir,
        None => env::current_dir().map_err(|err| {
            AppError::from(err).with_context("operation", "resolve_default_db_path")
        })?,
    };
    Ok(base.join(APP_DIR_NAME).join(DB_FILE_NAME))
}

fn interval_from_minutes(raw: Option<&str>) -> Duration {
    let minutes = raw
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BACKUP_INTERVAL_MINUTES);
    Duration::from_secs(minutes * 60)
}
