use std::collections::HashMap;

/// A delimited file as read: one header row plus data rows, cells already trimmed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One CSV row keyed by canonical (lower-cased, trimmed, aliased) column name.
///
/// Ephemeral: produced by the normalizer and consumed by the record builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `column`, or `None` when the column is absent or the cell is blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Whether the column exists at all, blank or not
    pub fn has_column(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Insert a cell. The first non-empty value for a column is kept.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let slot = self.cells.entry(column.into()).or_default();
        if slot.trim().is_empty() {
            *slot = value;
        }
    }

    /// Ensure the column exists, leaving any present value alone
    pub fn ensure_column(&mut self, column: &str) {
        self.cells.entry(column.to_string()).or_default();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// A table after header normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    /// Canonical column names in first-seen order, required columns appended if missing
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}
