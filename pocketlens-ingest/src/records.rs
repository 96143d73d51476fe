//! Record building: normalized rows → canonical transactions and budgets.
//!
//! Lenient ingestion: rows whose date/amount (or budget month/category) cannot be
//! coerced are filtered out here, after coercion, and never surface individually.

use anyhow::Result;
use pocketlens_core::{CanonicalBudget, CanonicalTransaction};
use tracing::debug;

use crate::classify::classify_kind;
use crate::columns::ColumnNormalizer;
use crate::reader::read_table;
use crate::types::{NormalizedTable, RawRow};
use crate::values::{parse_amount, parse_date, parse_month, title_case};

fn transaction_from_row(row: &RawRow, owner_id: &str) -> Option<CanonicalTransaction> {
    let date = parse_date(row.get("date")?)?;
    let amount = parse_amount(row.get("amount")?)?;
    let kind = classify_kind(row.get("type"));

    Some(CanonicalTransaction {
        owner_id: owner_id.to_string(),
        date,
        amount,
        kind,
        description: row
            .get("description")
            .or_else(|| row.get("narration"))
            .map(str::to_string),
        category_name: row.get("category").map(str::to_string),
    })
}

fn budget_from_row(row: &RawRow, owner_id: &str) -> Option<CanonicalBudget> {
    let category_name = title_case(row.get("category")?);
    if category_name.is_empty() {
        return None;
    }
    let amount = parse_amount(row.get("amount")?)?;
    let month = parse_month(row.get("month")?)?;

    Some(CanonicalBudget {
        owner_id: owner_id.to_string(),
        category_name,
        month,
        amount,
    })
}

/// Canonical transactions for every valid row. `owner_id` comes from the caller's
/// authenticated identity, never from file content.
pub fn build_transactions(table: &NormalizedTable, owner_id: &str) -> Vec<CanonicalTransaction> {
    let out: Vec<_> = table
        .rows
        .iter()
        .filter_map(|row| transaction_from_row(row, owner_id))
        .collect();
    debug!(
        kept = out.len(),
        dropped = table.rows.len() - out.len(),
        "built transactions"
    );
    out
}

pub fn build_budgets(table: &NormalizedTable, owner_id: &str) -> Vec<CanonicalBudget> {
    let out: Vec<_> = table
        .rows
        .iter()
        .filter_map(|row| budget_from_row(row, owner_id))
        .collect();
    debug!(
        kept = out.len(),
        dropped = table.rows.len() - out.len(),
        "built budgets"
    );
    out
}

/// Full transaction pipeline over raw CSV text
pub fn ingest_transactions_csv(text: &str, owner_id: &str) -> Result<Vec<CanonicalTransaction>> {
    let table = read_table(text)?;
    let normalized = ColumnNormalizer::transactions().normalize(&table);
    Ok(build_transactions(&normalized, owner_id))
}

/// Full budget pipeline over raw CSV text
pub fn ingest_budgets_csv(text: &str, owner_id: &str) -> Result<Vec<CanonicalBudget>> {
    let table = read_table(text)?;
    let normalized = ColumnNormalizer::budgets().normalize(&table);
    Ok(build_budgets(&normalized, owner_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pocketlens_core::TxnKind;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_debit_in_rupees_becomes_expense() {
        let txns = ingest_transactions_csv("date,amount,type\n2024-01-05,\"₹1,200\",debit\n", "u-1").unwrap();
        assert_eq!(txns.len(), 1);
        let t = &txns[0];
        assert_eq!(t.date, ymd(2024, 1, 5));
        assert_eq!(t.amount, 1200.0);
        assert_eq!(t.kind, TxnKind::Expense);
        assert_eq!(t.owner_id, "u-1");
        assert_eq!(t.description, None);
        assert_eq!(t.category_name, None);
    }

    #[test]
    fn test_unparseable_date_yields_nothing() {
        let txns = ingest_transactions_csv("date,amount,type\nnot-a-date,50,income\n", "u-1").unwrap();
        assert!(txns.is_empty());
    }

    #[test]
    fn test_rows_missing_date_or_amount_are_dropped() {
        let csv = "date,amount,type\n2024-01-05,,income\n,10,income\n2024-01-06,abc,income\n2024-01-07,10,\n";
        let txns = ingest_transactions_csv(csv, "u-1").unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].date, ymd(2024, 1, 7));
        assert_eq!(txns[0].kind, TxnKind::Expense);
    }

    #[test]
    fn test_missing_type_column_defaults_to_expense() {
        let txns = ingest_transactions_csv("Posted_Date,Credit\n2024-02-01,500\n", "u-1").unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].kind, TxnKind::Expense);
        assert_eq!(txns[0].amount, 500.0);
    }

    #[test]
    fn test_description_falls_back_to_narration() {
        let csv = "date,amount,type,description,narration,category\n\
                   2024-01-05,10,cr,,UPI/SALARY,Salary\n\
                   2024-01-06,20,dr,Coffee,ignored,\n";
        let txns = ingest_transactions_csv(csv, "u-1").unwrap();
        assert_eq!(txns[0].description.as_deref(), Some("UPI/SALARY"));
        assert_eq!(txns[0].category_name.as_deref(), Some("Salary"));
        assert_eq!(txns[0].kind, TxnKind::Income);
        assert_eq!(txns[1].description.as_deref(), Some("Coffee"));
        assert_eq!(txns[1].category_name, None);
    }

    #[test]
    fn test_budget_row_is_title_cased_and_first_of_month() {
        let budgets = ingest_budgets_csv("category,amount,month\ngroceries,\"5,000\",2025-11\n", "u-9").unwrap();
        assert_eq!(budgets.len(), 1);
        let b = &budgets[0];
        assert_eq!(b.category_name, "Groceries");
        assert_eq!(b.amount, 5000.0);
        assert_eq!(b.month, ymd(2025, 11, 1));
        assert_eq!(b.owner_id, "u-9");
    }

    #[test]
    fn test_budget_full_date_month_is_kept_as_given() {
        let budgets = ingest_budgets_csv("Category_Name,Limit,Month\nrent,20000,2025-11-15\n", "u-9").unwrap();
        assert_eq!(budgets[0].month, ymd(2025, 11, 15));
        assert_eq!(budgets[0].category_name, "Rent");
    }

    #[test]
    fn test_invalid_budget_rows_are_dropped() {
        let csv = "category,budget,month\n,100,2025-11\nfood,,2025-11\nfood,100,\nfood,100,someday\nfuel,300,2025-12\n";
        let budgets = ingest_budgets_csv(csv, "u-9").unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].category_name, "Fuel");
    }
}
