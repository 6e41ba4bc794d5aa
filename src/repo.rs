use sqlx::SqlitePool;

use crate::model::{Category, LedgerEntry, NewTransaction, Period};
use crate::time::{now_wire, to_wire};
use crate::{AppError, AppResult};

const ENTRY_COLUMNS: &str = "t.id, t.amount, t.currency, t.description, t.date, t.created_at, \
     c.name AS category_name, c.type AS category_type";

/// Live (not soft-deleted) transactions.
pub async fn count_active_transactions(pool: &SqlitePool) -> AppResult<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE deleted_at IS NULL")
            .fetch_one(pool)
            .await
            .map_err(|err| AppError::from(err).with_context("operation", "count_transactions"))?;
    Ok(count)
}

/// The full catalog ordered by type then name, so `expense` rows come first.
pub async fn list_categories(pool: &SqlitePool) -> AppResult<Vec<Category>> {
    let rows = sqlx::query("SELECT id, name, type, icon, color FROM categories ORDER BY type, name")
        .fetch_all(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "list_categories"))?;
    rows.iter().map(Category::try_from).collect()
}

/// Exact, case-sensitive lookup.
pub async fn category_by_name(pool: &SqlitePool, name: &str) -> AppResult<Option<Category>> {
    let row = sqlx::query("SELECT id, name, type, icon, color FROM categories WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "category_by_name")
                .with_context("name", name.to_string())
        })?;
    row.as_ref().map(Category::try_from).transpose()
}

/// Live transactions in `period`, newest first. Stored dates mix layouts, so
/// rows are ordered by the instant they name rather than by their text.
pub async fn list_entries(pool: &SqlitePool, period: &Period) -> AppResult<Vec<LedgerEntry>> {
    let rows = match period.year_prefix() {
        None => {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM transactions t \
                 JOIN categories c ON c.id = t.category_id \
                 WHERE t.deleted_at IS NULL \
                 ORDER BY julianday(t.date) DESC, t.id DESC"
            );
            sqlx::query(&sql).fetch_all(pool).await
        }
        Some(year) => {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM transactions t \
                 JOIN categories c ON c.id = t.category_id \
                 WHERE t.deleted_at IS NULL AND substr(t.date, 1, 4) = ? \
                 ORDER BY julianday(t.date) DESC, t.id DESC"
            );
            sqlx::query(&sql).bind(year).fetch_all(pool).await
        }
    }
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "list_entries")
            .with_context("period", period.to_string())
    })?;
    rows.iter().map(LedgerEntry::try_from).collect()
}

pub async fn insert_transaction(pool: &SqlitePool, tx: &NewTransaction) -> AppResult<i64> {
    let res = sqlx::query(
        "INSERT INTO transactions (user_id, category_id, amount, currency, description, date) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(tx.user_id)
    .bind(tx.category_id)
    .bind(tx.amount)
    .bind(&tx.currency)
    .bind(&tx.description)
    .bind(to_wire(&tx.date))
    .execute(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "insert_transaction")
            .with_context("category_id", tx.category_id.to_string())
    })?;
    Ok(res.last_insert_rowid())
}

/// Soft delete: the row stays but drops out of counts and exports.
pub async fn set_deleted_at(pool: &SqlitePool, id: i64) -> AppResult<()> {
    let res = sqlx::query("UPDATE transactions SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now_wire())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "soft_delete"))?;
    if res.rows_affected() == 0 {
        return Err(AppError::new("TRANSACTION/NOT_FOUND", "Transaction not found")
            .with_context("id", id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{self, DEFAULT_USER_ID};
    use crate::model::CategoryKind;
    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:");
        schema::bootstrap(&pool).await.unwrap();
        pool
    }

    async fn insert(pool: &SqlitePool, category: &str, amount: i64, y: i32, m: u32, d: u32) -> i64 {
        let category = category_by_name(pool, category).await.unwrap().unwrap();
        insert_transaction(
            pool,
            &NewTransaction {
                user_id: DEFAULT_USER_ID,
                category_id: category.id,
                amount,
                currency: "USD".into(),
                description: format!("{category} {amount}", category = category.name),
                date: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn categories_are_ordered_by_type_then_name() {
        let pool = seeded_pool().await;
        let cats = list_categories(&pool).await.unwrap();
        assert_eq!(cats.first().map(|c| c.name.as_str()), Some("Education"));
        let first_income = cats
            .iter()
            .position(|c| c.kind == CategoryKind::Income)
            .unwrap();
        assert!(cats[..first_income]
            .iter()
            .all(|c| c.kind == CategoryKind::Expense));
    }

    #[tokio::test]
    async fn category_lookup_is_case_sensitive() {
        let pool = seeded_pool().await;
        assert!(category_by_name(&pool, "Food").await.unwrap().is_some());
        assert!(category_by_name(&pool, "food").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_filter_by_year_prefix_and_sort_newest_first() {
        let pool = seeded_pool().await;
        let older = insert(&pool, "Food", -1200, 2026, 1, 15).await;
        let newer = insert(&pool, "Earned Income", 500_000, 2026, 3, 1).await;
        insert(&pool, "Travel", -90_000, 2025, 12, 31).await;

        let year = list_entries(&pool, &Period::Year(2026)).await.unwrap();
        let ids: Vec<i64> = year.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newer, older]);
        assert_eq!(year[0].category_kind, CategoryKind::Income);
        assert_eq!(year[1].amount, -1200);

        assert_eq!(list_entries(&pool, &Period::All).await.unwrap().len(), 3);
        assert!(list_entries(&pool, &Period::Year(2024)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entries_sort_by_instant_across_stored_date_layouts() {
        let pool = seeded_pool().await;
        let food = category_by_name(&pool, "Food").await.unwrap().unwrap();
        let mut ids = Vec::new();
        for date in [
            "2026-01-15T01:00:00Z",
            "2026-01-15 23:00:00+00:00",
            "2026-01-15 03:00:00+05:00",
        ] {
            let res = sqlx::query(
                "INSERT INTO transactions (user_id, category_id, amount, currency, description, date) \
                 VALUES (?, ?, -100, 'USD', ?, ?)",
            )
            .bind(DEFAULT_USER_ID)
            .bind(food.id)
            .bind(date)
            .bind(date)
            .execute(&pool)
            .await
            .unwrap();
            ids.push(res.last_insert_rowid());
        }
        let (wire, late_legacy, early_legacy) = (ids[0], ids[1], ids[2]);

        let year = list_entries(&pool, &Period::Year(2026)).await.unwrap();
        let order: Vec<i64> = year.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![late_legacy, wire, early_legacy]);
    }

    #[tokio::test]
    async fn soft_deleted_rows_drop_out_of_counts_and_entries() {
        let pool = seeded_pool().await;
        let id = insert(&pool, "Pets", -4000, 2026, 2, 2).await;
        assert_eq!(count_active_transactions(&pool).await.unwrap(), 1);

        set_deleted_at(&pool, id).await.unwrap();
        assert_eq!(count_active_transactions(&pool).await.unwrap(), 0);
        assert!(list_entries(&pool, &Period::All).await.unwrap().is_empty());

        let err = set_deleted_at(&pool, id).await.expect_err("already deleted");
        assert_eq!(err.code(), "TRANSACTION/NOT_FOUND");
    }
}
