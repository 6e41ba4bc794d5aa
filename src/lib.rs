//! Backup, restore and cache reconciliation for the pennywise ledger.

pub mod backup;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod state;
pub mod sync;
pub mod time;

pub use error::{AppError, AppResult};
pub use logging::init as init_logging;
