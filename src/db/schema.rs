use sqlx::SqlitePool;
use tracing::info;

use crate::{AppError, AppResult};

/// Tables the ledger needs. Every statement is idempotent so bootstrap can
/// run on every open, including against a freshly restored snapshot.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL CHECK(type IN ('income', 'expense')),
    icon TEXT,
    color TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    description TEXT NOT NULL,
    date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    deleted_at TEXT DEFAULT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
"#;

/// Owner of every transaction in this single-user ledger.
pub const DEFAULT_USER_ID: i64 = 1;

/// `(name, type, icon, color)` for the catalog a fresh store starts with.
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str, &str)] = &[
    ("Earned Income", "income", "💰", "#2ECC71"),
    ("Investment Income", "income", "📈", "#27AE60"),
    ("Other Income", "income", "💵", "#16A085"),
    ("Food", "expense", "🍔", "#FF5733"),
    ("Transport", "expense", "🚕", "#33C1FF"),
    ("Housing", "expense", "🏠", "#8D33FF"),
    ("Entertainment", "expense", "🎬", "#E74C3C"),
    ("Shopping", "expense", "🛍️", "#9B59B6"),
    ("Health", "expense", "💊", "#1ABC9C"),
    ("Education", "expense", "📚", "#3498DB"),
    ("Personal Care", "expense", "💇", "#E67E22"),
    ("Subscriptions", "expense", "📱", "#2980B9"),
    ("Gifts & Donations", "expense", "🎁", "#E91E63"),
    ("Travel", "expense", "✈️", "#00BCD4"),
    ("Pets", "expense", "🐾", "#795548"),
];

pub async fn bootstrap(pool: &SqlitePool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "apply_schema"))?;

    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "count_users"))?;
    if users == 0 {
        sqlx::query("INSERT INTO users (id, name, email) VALUES (?, 'Owner', 'owner@localhost')")
            .bind(DEFAULT_USER_ID)
            .execute(pool)
            .await
            .map_err(|err| AppError::from(err).with_context("operation", "seed_user"))?;
        info!(target: "pennywise", event = "seed_user");
    }

    let (categories,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "count_categories"))?;
    if categories == 0 {
        let mut tx = pool.begin().await?;
        for &(name, kind, icon, color) in DEFAULT_CATEGORIES {
            sqlx::query("INSERT INTO categories (name, type, icon, color) VALUES (?, ?, ?, ?)")
                .bind(name)
                .bind(kind)
                .bind(icon)
                .bind(color)
                .execute(&mut *tx)
                .await
                .map_err(|err| {
                    AppError::from(err)
                        .with_context("operation", "seed_category")
                        .with_context("name", name)
                })?;
        }
        tx.commit().await?;
        info!(
            target: "pennywise",
            event = "seed_categories",
            count = DEFAULT_CATEGORIES.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:")
    }

    #[tokio::test]
    async fn bootstrap_seeds_user_and_catalog_once() {
        let pool = memory_pool().await;
        bootstrap(&pool).await.unwrap();
        bootstrap(&pool).await.unwrap();

        let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);

        let (categories,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(categories as usize, DEFAULT_CATEGORIES.len());
    }

    #[tokio::test]
    async fn bootstrap_leaves_existing_catalog_alone() {
        let pool = memory_pool().await;
        sqlx::raw_sql(SCHEMA).execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO categories (name, type) VALUES ('Rent', 'expense')")
            .execute(&pool)
            .await
            .unwrap();

        bootstrap(&pool).await.unwrap();

        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM categories")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(names, vec![("Rent".to_string(),)]);
    }

    #[tokio::test]
    async fn category_names_are_unique_and_case_sensitive() {
        let pool = memory_pool().await;
        bootstrap(&pool).await.unwrap();

        let dup = sqlx::query("INSERT INTO categories (name, type) VALUES ('Food', 'expense')")
            .execute(&pool)
            .await;
        assert!(dup.is_err());

        sqlx::query("INSERT INTO categories (name, type) VALUES ('food', 'expense')")
            .execute(&pool)
            .await
            .expect("different case is a different name");
    }
}
