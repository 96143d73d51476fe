//! Column normalization: arbitrary CSV headers → canonical field names.
//!
//! Headers are trimmed and lower-cased, then renamed through a fixed alias table.
//! Required columns are guaranteed to exist afterwards (empty when the file lacks them).

use crate::types::{NormalizedTable, RawRow, Table};

/// Header normalization rules for one kind of upload
#[derive(Debug, Clone, Copy)]
pub struct ColumnNormalizer {
    aliases: &'static [(&'static str, &'static str)],
    required: &'static [&'static str],
}

const TRANSACTION_ALIASES: &[(&str, &str)] = &[
    ("txn_date", "date"),
    ("posted_date", "date"),
    ("credit", "amount"),
    ("debit", "amount"),
];
const TRANSACTION_REQUIRED: &[&str] = &["date", "amount", "type"];

const BUDGET_ALIASES: &[(&str, &str)] = &[
    ("budget", "amount"),
    ("limit", "amount"),
    ("category_name", "category"),
];
const BUDGET_REQUIRED: &[&str] = &["category", "amount", "month"];

impl ColumnNormalizer {
    pub const fn transactions() -> Self {
        Self {
            aliases: TRANSACTION_ALIASES,
            required: TRANSACTION_REQUIRED,
        }
    }

    pub const fn budgets() -> Self {
        Self {
            aliases: BUDGET_ALIASES,
            required: BUDGET_REQUIRED,
        }
    }

    /// Canonical name for a single header
    pub fn canonical_name(&self, header: &str) -> String {
        let cleaned = header
            .trim_start_matches('\u{feff}')
            .trim()
            .to_lowercase();
        self.aliases
            .iter()
            .find(|(alias, _)| *alias == cleaned)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(cleaned)
    }

    /// Canonical column list: renamed headers (deduplicated, first-seen order)
    /// followed by any required column the file did not provide.
    pub fn normalize_headers(&self, headers: &[String]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::with_capacity(headers.len() + self.required.len());
        for h in headers {
            let name = self.canonical_name(h);
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        for req in self.required {
            if !columns.iter().any(|c| c == req) {
                columns.push(req.to_string());
            }
        }
        columns
    }

    /// Normalize a whole table into canonical rows.
    ///
    /// When several source columns map onto the same canonical name (e.g. both `debit`
    /// and `credit` present) the leftmost non-empty cell wins for each row.
    pub fn normalize(&self, table: &Table) -> NormalizedTable {
        let names: Vec<String> = table.headers.iter().map(|h| self.canonical_name(h)).collect();
        let columns = self.normalize_headers(&table.headers);

        let rows = table
            .rows
            .iter()
            .map(|cells| {
                let mut row = RawRow::new();
                for (name, value) in names.iter().zip(cells.iter()) {
                    row.insert(name.as_str(), value.as_str());
                }
                for col in &columns {
                    row.ensure_column(col);
                }
                row
            })
            .collect();

        NormalizedTable { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(hs: &[&str]) -> Vec<String> {
        hs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_aliases_ignore_case_and_whitespace() {
        let n = ColumnNormalizer::transactions();
        for h in ["txn_date", "TXN_DATE", "  Posted_Date ", "Date", " date\t"] {
            assert_eq!(n.canonical_name(h), "date", "header {h:?}");
        }
        for h in ["Credit", " DEBIT", "amount", "Amount "] {
            assert_eq!(n.canonical_name(h), "amount", "header {h:?}");
        }

        let b = ColumnNormalizer::budgets();
        for h in ["Budget", "LIMIT", " amount"] {
            assert_eq!(b.canonical_name(h), "amount");
        }
        assert_eq!(b.canonical_name("Category_Name"), "category");
    }

    #[test]
    fn test_budget_aliases_do_not_apply_to_transactions() {
        let n = ColumnNormalizer::transactions();
        assert_eq!(n.canonical_name("limit"), "limit");
        assert_eq!(n.canonical_name("category_name"), "category_name");
    }

    #[test]
    fn test_required_columns_are_inserted() {
        let n = ColumnNormalizer::transactions();
        let cols = n.normalize_headers(&headers(&["Narration", "Debit"]));
        assert_eq!(cols, vec!["narration", "amount", "date", "type"]);

        let b = ColumnNormalizer::budgets();
        let cols = b.normalize_headers(&headers(&["Limit"]));
        assert_eq!(cols, vec!["amount", "category", "month"]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let n = ColumnNormalizer::transactions();
        let once = n.normalize_headers(&headers(&["Posted_Date", "Credit", "Type", "Description"]));
        let twice = n.normalize_headers(&once);
        assert_eq!(once, twice);
        assert_eq!(once, vec!["date", "amount", "type", "description"]);
    }

    #[test]
    fn test_rows_get_missing_columns_and_merge_aliases() {
        let n = ColumnNormalizer::transactions();
        let table = Table {
            headers: headers(&["Txn_Date", "Debit", "Credit"]),
            rows: vec![
                vec!["2024-01-05".into(), "".into(), "300".into()],
                vec!["2024-01-06".into(), "40".into(), "".into()],
            ],
        };
        let out = n.normalize(&table);
        assert_eq!(out.columns, vec!["date", "amount", "type"]);
        assert_eq!(out.rows[0].get("amount"), Some("300"));
        assert_eq!(out.rows[1].get("amount"), Some("40"));
        assert!(out.rows[0].has_column("type"));
        assert_eq!(out.rows[0].get("type"), None);
    }
}
