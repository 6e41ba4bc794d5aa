use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{sqlite::SqliteRow, Row};

use crate::{AppError, AppResult};

pub const INVALID_PERIOD_CODE: &str = "SYNC/INVALID_PERIOD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(AppError::new("CATEGORY/INVALID_TYPE", "Unknown category type")
                .with_context("type", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: CategoryKind,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl TryFrom<&SqliteRow> for Category {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let kind: String = row.try_get("type").map_err(AppError::from)?;
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            kind: kind.parse()?,
            icon: row.try_get("icon").map_err(AppError::from)?,
            color: row.try_get("color").map_err(AppError::from)?,
        })
    }
}

/// A live transaction joined with its category, as the export reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i64,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    /// Stored text, not yet normalised to the wire format.
    pub date: String,
    pub created_at: Option<String>,
    pub category_name: String,
    pub category_kind: CategoryKind,
}

impl TryFrom<&SqliteRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let kind: String = row.try_get("category_type").map_err(AppError::from)?;
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            amount: row.try_get("amount").map_err(AppError::from)?,
            currency: row.try_get("currency").map_err(AppError::from)?,
            description: row.try_get("description").map_err(AppError::from)?,
            date: row.try_get("date").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            category_name: row.try_get("category_name").map_err(AppError::from)?,
            category_kind: kind.parse()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub category_id: i64,
    /// Minor units; the sign is stored exactly as given.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

/// Which transactions an export covers: everything, or one calendar year
/// matched against the first four characters of the stored date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    Year(u16),
}

impl Period {
    pub fn current_year() -> Self {
        // Four-digit years only; chrono's clock will not leave that range.
        Period::Year(Utc::now().year().clamp(0, 9999) as u16)
    }

    /// Parse an optional selector; absent or blank means the current year.
    pub fn from_param(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value.parse(),
            None => Ok(Self::current_year()),
        }
    }

    /// The `YYYY` prefix to match, or `None` for every row.
    pub fn year_prefix(&self) -> Option<String> {
        match self {
            Period::All => None,
            Period::Year(year) => Some(format!("{year:04}")),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => f.write_str("all"),
            Period::Year(year) => write!(f, "{year:04}"),
        }
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "all" {
            return Ok(Period::All);
        }
        if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(year) = value.parse::<u16>() {
                return Ok(Period::Year(year));
            }
        }
        Err(
            AppError::new(INVALID_PERIOD_CODE, "Period must be \"all\" or a four-digit year")
                .with_context("period", value.to_string()),
        )
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|err: AppError| serde::de::Error::custom(err.message()))
    }
}
