//! Export/import protocol between the client-side cache and the store.

pub mod envelope;
pub mod export;
pub mod import;

pub use envelope::{ExportEnvelope, ImportOutcome, ImportRequest, SyncCategory, SyncStatus, SyncTransaction};
pub use export::{export, export_to_file};
pub use import::import;
