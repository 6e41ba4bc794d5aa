use crate::db::schema::DEFAULT_USER_ID;
use crate::db::Store;
use crate::model::{Category, NewTransaction};
use crate::repo;
use crate::sync::envelope::{ImportOutcome, SyncTransaction};
use crate::time::parse_wire;
use crate::{AppError, AppResult};

/// Rebuild an empty store from the client cache.
///
/// A store that already holds live transactions is left alone and every
/// record is reported as skipped. Otherwise each record is inserted on its
/// own; a record that cannot be placed is counted in `errors` and the rest
/// of the batch carries on.
pub async fn import(store: &Store, records: &[SyncTransaction]) -> AppResult<ImportOutcome> {
    let existing = repo::count_active_transactions(store.pool()).await?;
    if existing > 0 {
        tracing::info!(
            target: "pennywise",
            event = "sync_import_skipped",
            existing,
            records = records.len()
        );
        return Ok(ImportOutcome {
            imported: 0,
            skipped: records.len(),
            errors: 0,
        });
    }

    let mut fallback = FallbackCategory::default();
    let mut imported = 0;
    let mut errors = 0;
    for (index, record) in records.iter().enumerate() {
        match import_one(store, record, &mut fallback).await {
            Ok(_) => imported += 1,
            Err(err) => {
                errors += 1;
                tracing::warn!(
                    target: "pennywise",
                    event = "sync_import_record_failed",
                    index,
                    code = %err.code(),
                    error = %err
                );
            }
        }
    }

    let outcome = ImportOutcome {
        imported,
        skipped: records.len() - imported - errors,
        errors,
    };
    tracing::info!(
        target: "pennywise",
        event = "sync_import",
        imported = outcome.imported,
        skipped = outcome.skipped,
        errors = outcome.errors
    );
    Ok(outcome)
}

async fn import_one(
    store: &Store,
    record: &SyncTransaction,
    fallback: &mut FallbackCategory,
) -> AppResult<i64> {
    let category = match repo::category_by_name(store.pool(), &record.category_name).await? {
        Some(category) => category,
        None => fallback.resolve(store).await?.ok_or_else(|| {
            AppError::new("SYNC/NO_CATEGORY", "No category available for import")
                .with_context("category_name", record.category_name.clone())
        })?,
    };

    let date = parse_wire(&record.date).map_err(|err| {
        AppError::new("SYNC/INVALID_DATE", "Transaction date is not RFC 3339")
            .with_context("date", record.date.clone())
            .with_context("error", err.to_string())
    })?;

    repo::insert_transaction(
        store.pool(),
        &NewTransaction {
            user_id: DEFAULT_USER_ID,
            category_id: category.id,
            amount: record.amount,
            currency: record.currency.clone(),
            description: record.description.clone(),
            date,
        },
    )
    .await
}

/// First category in (type, name) order, looked up once per batch.
#[derive(Default)]
struct FallbackCategory {
    loaded: Option<Option<Category>>,
}

impl FallbackCategory {
    async fn resolve(&mut self, store: &Store) -> AppResult<Option<Category>> {
        if let Some(cached) = &self.loaded {
            return Ok(cached.clone());
        }
        let first = repo::list_categories(store.pool()).await?.into_iter().next();
        self.loaded = Some(first.clone());
        Ok(first)
    }
}
