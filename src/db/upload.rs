//! Gatekeeper for uploaded snapshots. Nothing reaches the snapshot engine's
//! restore path without passing the header check here first.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

use crate::AppError;

/// First 16 bytes of every SQLite 3 database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
/// Largest upload accepted for restore.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

pub const INVALID_FORMAT_MESSAGE: &str = "Invalid file: not a SQLite database";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload is {len} bytes, shorter than the SQLite header")]
    TooShort { len: usize },
    #[error("upload does not start with the SQLite header")]
    SignatureMismatch,
    #[error("failed to read upload header: {0}")]
    Read(#[from] io::Error),
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::TooLarge { .. } => "UPLOAD/TOO_LARGE",
            _ => "UPLOAD/INVALID_FORMAT",
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let message = match err {
            UploadError::TooLarge { .. } => "Upload too large".to_string(),
            _ => INVALID_FORMAT_MESSAGE.to_string(),
        };
        AppError::new(err.code(), message).with_context("reason", err.to_string())
    }
}

/// Check an in-memory upload: size limit first, then the header.
pub fn validate_bytes(bytes: &[u8]) -> Result<(), UploadError> {
    check_size(bytes.len() as u64)?;
    validate_reader(bytes)
}

/// Read exactly the header prefix from `reader` and compare it byte for
/// byte. Consumes at most 16 bytes.
pub fn validate_reader<R: Read>(reader: R) -> Result<(), UploadError> {
    let mut prefix = Vec::with_capacity(SQLITE_HEADER.len());
    reader
        .take(SQLITE_HEADER.len() as u64)
        .read_to_end(&mut prefix)?;
    if prefix.len() < SQLITE_HEADER.len() {
        return Err(UploadError::TooShort { len: prefix.len() });
    }
    if prefix.as_slice() != SQLITE_HEADER.as_slice() {
        return Err(UploadError::SignatureMismatch);
    }
    Ok(())
}

pub fn validate_file(path: &Path) -> Result<(), UploadError> {
    let file = File::open(path)?;
    check_size(file.metadata()?.len())?;
    validate_reader(file)
}

fn check_size(size: u64) -> Result<(), UploadError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}
