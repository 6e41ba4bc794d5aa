#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use pennywise_lib::config::Config;
use pennywise_lib::db::Store;
use pennywise_lib::model::NewTransaction;
use pennywise_lib::repo;
use pennywise_lib::state::AppState;
use pennywise_lib::time::parse_wire;

pub async fn open_store(dir: &Path, name: &str) -> Store {
    Store::open(&dir.join(name)).await.expect("open store")
}

pub fn config(db_path: PathBuf, backup_dir: Option<PathBuf>) -> Config {
    Config {
        db_path,
        backup_dir,
        backup_interval: Duration::from_secs(3600),
    }
}

pub async fn open_state(dir: &Path, backup_dir: Option<PathBuf>) -> AppState {
    AppState::open(config(dir.join("ledger.db"), backup_dir))
        .await
        .expect("open app state")
}

/// Insert one live transaction under `category` dated `date` (RFC 3339).
pub async fn seed(store: &Store, category: &str, amount: i64, date: &str, description: &str) -> i64 {
    let category = repo::category_by_name(store.pool(), category)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("category {category} is seeded"));
    repo::insert_transaction(
        store.pool(),
        &NewTransaction {
            user_id: 1,
            category_id: category.id,
            amount,
            currency: "USD".into(),
            description: description.into(),
            date: parse_wire(date).unwrap(),
        },
    )
    .await
    .unwrap()
}

/// `(amount, currency, description, date, category)` of every live row,
/// sorted so stores can be compared without ids.
pub async fn live_rows(store: &Store) -> Vec<(i64, String, String, String, String)> {
    let mut rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
        "SELECT t.amount, t.currency, t.description, t.date, c.name \
         FROM transactions t JOIN categories c ON c.id = t.category_id \
         WHERE t.deleted_at IS NULL",
    )
    .fetch_all(store.pool())
    .await
    .unwrap();
    rows.sort();
    rows
}
