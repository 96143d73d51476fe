//! Upload pipelines: CSV text → canonical records → categories resolved → bulk insert.

use chrono::NaiveDate;
use pocketlens_core::{CanonicalBudget, CanonicalTransaction, TxnKind};
use pocketlens_ingest::{ingest_budgets_csv, ingest_transactions_csv};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use crate::backend::TableStore;
use crate::categories::CategoryResolver;
use crate::error::{ImportError, StoreError};
use crate::query::Insert;
use crate::session::Authenticated;

pub const TRANSACTIONS_TABLE: &str = "transactions";
pub const BUDGETS_TABLE: &str = "budgets";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub categories_created: usize,
}

#[derive(Serialize)]
struct TransactionRow<'a> {
    user_id: &'a str,
    date: NaiveDate,
    amount: f64,
    #[serde(rename = "type")]
    kind: TxnKind,
    description: Option<&'a str>,
    category_id: Option<String>,
}

#[derive(Serialize)]
struct BudgetRow<'a> {
    user_id: &'a str,
    month: NaiveDate,
    amount: f64,
    category_id: String,
}

fn to_values<T: Serialize>(rows: &[T]) -> Result<Vec<Value>, StoreError> {
    rows.iter()
        .map(|r| serde_json::to_value(r).map_err(|e| StoreError::Decode(e.to_string())))
        .collect()
}

/// Resolve categories for already-built transactions and insert them in one batch
pub async fn store_transactions<S: TableStore>(
    client: &Authenticated<S>,
    txns: &[CanonicalTransaction],
) -> Result<ImportReport, ImportError> {
    if txns.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    let mut rows = Vec::with_capacity(txns.len());
    let mut resolvers: HashMap<&str, CategoryResolver<'_, S>> = HashMap::new();
    for t in txns {
        let category_id = match t.category_name.as_deref() {
            Some(name) => {
                let resolver = resolvers
                    .entry(&t.owner_id)
                    .or_insert_with(|| CategoryResolver::new(client, &t.owner_id));
                Some(resolver.resolve(name, t.kind).await?)
            }
            None => None,
        };
        rows.push(TransactionRow {
            user_id: &t.owner_id,
            date: t.date,
            amount: t.amount,
            kind: t.kind,
            description: t.description.as_deref(),
            category_id,
        });
    }

    let created: usize = resolvers.values().map(CategoryResolver::created).sum();
    client
        .insert(&Insert::new(TRANSACTIONS_TABLE, to_values(&rows)?))
        .await?;
    info!(rows = rows.len(), categories_created = created, "imported transactions");

    Ok(ImportReport {
        inserted: rows.len(),
        categories_created: created,
    })
}

/// Resolve categories for already-built budgets and insert them in one batch.
/// Budget categories are always created as expense categories.
pub async fn store_budgets<S: TableStore>(
    client: &Authenticated<S>,
    budgets: &[CanonicalBudget],
) -> Result<ImportReport, ImportError> {
    if budgets.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    let mut rows = Vec::with_capacity(budgets.len());
    let mut resolvers: HashMap<&str, CategoryResolver<'_, S>> = HashMap::new();
    for b in budgets {
        let category_id = resolvers
            .entry(&b.owner_id)
            .or_insert_with(|| CategoryResolver::new(client, &b.owner_id))
            .resolve(&b.category_name, TxnKind::Expense)
            .await?;
        rows.push(BudgetRow {
            user_id: &b.owner_id,
            month: b.month,
            amount: b.amount,
            category_id,
        });
    }

    let created: usize = resolvers.values().map(CategoryResolver::created).sum();
    client.insert(&Insert::new(BUDGETS_TABLE, to_values(&rows)?)).await?;
    info!(rows = rows.len(), categories_created = created, "imported budgets");

    Ok(ImportReport {
        inserted: rows.len(),
        categories_created: created,
    })
}

/// Parse a transaction CSV for `owner_id` and store every valid row
pub async fn import_transactions<S: TableStore>(
    client: &Authenticated<S>,
    owner_id: &str,
    csv: &str,
) -> Result<ImportReport, ImportError> {
    let txns = ingest_transactions_csv(csv, owner_id).map_err(ImportError::Parse)?;
    store_transactions(client, &txns).await
}

/// Parse a budget CSV for `owner_id` and store every valid row
pub async fn import_budgets<S: TableStore>(
    client: &Authenticated<S>,
    owner_id: &str,
    csv: &str,
) -> Result<ImportReport, ImportError> {
    let budgets = ingest_budgets_csv(csv, owner_id).map_err(ImportError::Parse)?;
    store_budgets(client, &budgets).await
}
