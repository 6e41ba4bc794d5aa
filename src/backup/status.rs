use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// When the last fully successful backup cycle finished.
///
/// Shared between the scheduler, which writes it, and the status readers.
/// A poisoned lock still holds a valid timestamp, so it is recovered rather
/// than propagated.
#[derive(Debug, Default)]
pub struct BackupStatus {
    last_success: Mutex<Option<DateTime<Utc>>>,
}

impl BackupStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until a cycle has succeeded.
    pub fn get(&self) -> Option<DateTime<Utc>> {
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut guard = self.last_success.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(at);
    }
}
