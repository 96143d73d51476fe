//! Canonical finance record types produced by ingestion and handed to storage

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a transaction. Closed two-way set; `Expense` is the default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TxnKind {
    #[serde(rename = "income")]
    Income,
    #[default]
    #[serde(rename = "expense")]
    Expense,
}

impl TxnKind {
    /// Wire label used by the storage backend (`income` / `expense`)
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnKind::Income => "income",
            TxnKind::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TxnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A transaction after normalization, ready for storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalTransaction {
    /// Authenticated user the record is attributed to
    pub owner_id: String,
    /// Calendar date of the transaction (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Magnitude only; the sign lives in `kind`
    pub amount: f64,
    pub kind: TxnKind,
    pub description: Option<String>,
    pub category_name: Option<String>,
}

/// A monthly budget line after normalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalBudget {
    pub owner_id: String,
    /// Title-cased, never empty
    pub category_name: String,
    /// First of month for `YYYY-MM` input, otherwise the date as given
    pub month: NaiveDate,
    pub amount: f64,
}
