use std::collections::BTreeMap;
use std::fmt;
use std::io;

/// Failure reported by the ledger: a stable `code` for callers to match on,
/// a message fit for the user, and sorted key/value context for the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    code: String,
    message: String,
    context: BTreeMap<String, String>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Attach a detail; a repeated key keeps the latest value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    fn with_context_if<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with_context(key, value),
            None => self,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        let os_code = err.raw_os_error();
        AppError::new(format!("IO/{:?}", err.kind()), err.to_string())
            .with_context_if("os_code", os_code)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        let code = match err.classify() {
            Category::Io => "JSON/IO",
            Category::Syntax => "JSON/SYNTAX",
            Category::Data => "JSON/DATA",
            Category::Eof => "JSON/EOF",
        };
        let line = Some(err.line()).filter(|line| *line > 0);
        let column = Some(err.column()).filter(|column| *column > 0);
        AppError::new(code, err.to_string())
            .with_context_if("line", line)
            .with_context_if("column", column)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error;

        match err {
            Error::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            Error::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            Error::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            Error::Io(io_err) => AppError::from(io_err).with_context("driver", "sqlx"),
            Error::Database(db) => {
                let code = match db.code() {
                    Some(code) => format!("Sqlite/{code}"),
                    None => "SQLX/DATABASE".to_string(),
                };
                AppError::new(code, db.message()).with_context_if("constraint", db.constraint())
            }
            Error::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string()).with_context("column", index)
            }
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi, detail) => {
                let message = detail.unwrap_or_else(|| ffi.to_string());
                AppError::new(format!("Sqlite/{:?}", ffi.code), message)
                    .with_context("extended_code", ffi.extended_code)
            }
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::new("SQLITE/ROW_NOT_FOUND", "Record not found")
            }
            other => AppError::new("SQLITE/ERROR", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_context_in_key_order() {
        let err = AppError::new("SNAPSHOT/FAILED", "Snapshot failed")
            .with_context("path", "/tmp/pennywise.db")
            .with_context("operation", "backup_step")
            .with_context("operation", "finalize");

        assert_eq!(err.code(), "SNAPSHOT/FAILED");
        assert_eq!(err.context().get("operation").map(String::as_str), Some("finalize"));
        assert_eq!(
            err.to_string(),
            "[SNAPSHOT/FAILED] Snapshot failed (operation=finalize, path=/tmp/pennywise.db)"
        );
        assert_eq!(AppError::new("A", "b").to_string(), "[A] b");
    }

    #[test]
    fn serde_json_errors_capture_position() {
        let err = serde_json::from_str::<serde_json::Value>("{\"transactions\": }")
            .expect_err("invalid json");
        let app_error = AppError::from(err);
        assert_eq!(app_error.code(), "JSON/SYNTAX");
        assert_eq!(app_error.context().get("line").map(String::as_str), Some("1"));
        assert!(app_error.context().contains_key("column"));

        let err = serde_json::from_str::<Vec<i64>>("[1, \"two\"]").expect_err("wrong type");
        assert_eq!(AppError::from(err).code(), "JSON/DATA");
    }

    #[test]
    fn sqlx_row_not_found_translates_to_specific_code() {
        let app_error = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(app_error.code(), "SQLX/ROW_NOT_FOUND");
        assert!(app_error.context().is_empty());
    }

    #[test]
    fn rusqlite_failures_keep_the_sqlite_code() {
        let conn = rusqlite::Connection::open_in_memory().expect("open memory db");
        let err = conn
            .execute_batch("SELECT * FROM missing_table")
            .expect_err("missing table");
        let app_error = AppError::from(err);
        assert!(app_error.code().starts_with("Sqlite/"), "{app_error}");
        assert!(app_error.message().contains("missing_table"));
        assert!(app_error.context().contains_key("extended_code"));
    }

    #[test]
    fn io_error_contains_raw_code_when_available() {
        let app_error = AppError::from(io::Error::from_raw_os_error(2));
        assert_eq!(app_error.code(), "IO/NotFound");
        assert_eq!(app_error.context().get("os_code").map(String::as_str), Some("2"));

        let synthetic = AppError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!synthetic.context().contains_key("os_code"));
    }
}
