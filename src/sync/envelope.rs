use serde::{Deserialize, Serialize};

use crate::model::{Category, LedgerEntry, Period};
use crate::time::stored_to_wire;

fn default_currency() -> String {
    "USD".to_string()
}

/// One transaction as the client cache holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTransaction {
    #[serde(default)]
    pub id: i64,
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
    #[serde(default, alias = "category_name")]
    pub category_name: String,
    #[serde(default, alias = "category_type")]
    pub category_type: String,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
}

impl From<LedgerEntry> for SyncTransaction {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            currency: entry.currency,
            description: entry.description,
            date: stored_to_wire(&entry.date),
            category_name: entry.category_name,
            category_type: entry.category_kind.as_str().to_string(),
            created_at: entry
                .created_at
                .as_deref()
                .map(stored_to_wire)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCategory {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

impl From<Category> for SyncCategory {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            kind: category.kind.as_str().to_string(),
            icon: category.icon.unwrap_or_default(),
            color: category.color.unwrap_or_default(),
        }
    }
}

/// Everything the client needs to rebuild its cache for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub transactions: Vec<SyncTransaction>,
    pub categories: Vec<SyncCategory>,
    #[serde(alias = "year")]
    pub period: Period,
    #[serde(alias = "exported_at")]
    pub exported_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub transactions: Vec<SyncTransaction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl ImportOutcome {
    pub fn total(&self) -> usize {
        self.imported + self.skipped + self.errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    #[serde(alias = "transaction_count")]
    pub transaction_count: i64,
    #[serde(alias = "server_time")]
    pub server_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryKind;
    use serde_json::json;

    #[test]
    fn transaction_serializes_camel_case_and_normalises_dates() {
        let entry = LedgerEntry {
            id: 7,
            amount: -1250,
            currency: "EUR".into(),
            description: "Lunch".into(),
            date: "2026-01-15 12:00:00+00:00".into(),
            created_at: None,
            category_name: "Food".into(),
            category_kind: CategoryKind::Expense,
        };
        let value = serde_json::to_value(SyncTransaction::from(entry)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "amount": -1250,
                "currency": "EUR",
                "description": "Lunch",
                "date": "2026-01-15T12:00:00Z",
                "categoryName": "Food",
                "categoryType": "expense",
                "createdAt": ""
            })
        );
    }

    #[test]
    fn category_without_icon_or_color_renders_empty_strings() {
        let category = Category {
            id: 3,
            name: "Rent".into(),
            kind: CategoryKind::Expense,
            icon: None,
            color: None,
        };
        let value = serde_json::to_value(SyncCategory::from(category)).unwrap();
        assert_eq!(
            value,
            json!({ "id": 3, "name": "Rent", "type": "expense", "icon": "", "color": "" })
        );
    }

    #[test]
    fn import_request_accepts_snake_case_from_older_clients() {
        let request: ImportRequest = serde_json::from_value(json!({
            "transactions": [{
                "amount": 900,
                "description": "Refund",
                "date": "2025-06-01T08:30:00Z",
                "category_name": "Other Income",
                "created_at": "2025-06-01T08:31:00Z"
            }]
        }))
        .unwrap();
        let tx = &request.transactions[0];
        assert_eq!(tx.category_name, "Other Income");
        assert_eq!(tx.currency, "USD");
        assert_eq!(tx.created_at, "2025-06-01T08:31:00Z");
    }

    #[test]
    fn envelope_reads_legacy_year_key() {
        let envelope: ExportEnvelope = serde_json::from_value(json!({
            "transactions": [],
            "categories": [],
            "year": "2025",
            "exported_at": "2025-12-31T23:59:59Z"
        }))
        .unwrap();
        assert_eq!(envelope.period, Period::Year(2025));
        assert_eq!(envelope.exported_at, "2025-12-31T23:59:59Z");
    }
}
