//! Token-scoped query descriptions. Backends translate these; the HTTP backend
//! encodes them as PostgREST query parameters.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: String },
    Gte { column: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Plain column or a one-hop embedded column such as `categories(name)`
    pub column: String,
    pub ascending: bool,
}

/// A select with projection, filters, ordering, limit and optional exact count.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    /// PostgREST projection, e.g. `id,date,amount,categories(name)`
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub count_exact: bool,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            count_exact: false,
        }
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Gte {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }

    /// Query-string pairs in PostgREST syntax
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        for f in &self.filters {
            match f {
                Filter::Eq { column, value } => pairs.push((column.clone(), format!("eq.{value}"))),
                Filter::Gte { column, value } => pairs.push((column.clone(), format!("gte.{value}"))),
            }
        }
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }
        if let Some(n) = self.limit {
            pairs.push(("limit".to_string(), n.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Returning {
    #[default]
    Minimal,
    Representation,
}

impl Returning {
    pub fn prefer_header(&self) -> &'static str {
        match self {
            Returning::Minimal => "return=minimal",
            Returning::Representation => "return=representation",
        }
    }
}

/// Bulk insert of JSON objects into one table
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub rows: Vec<Value>,
    pub returning: Returning,
}

impl Insert {
    pub fn new(table: impl Into<String>, rows: Vec<Value>) -> Self {
        Self {
            table: table.into(),
            rows,
            returning: Returning::Minimal,
        }
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }
}

/// Result of a select: matching rows plus the exact count when requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub data: Vec<Value>,
    pub count: Option<u64>,
}

impl Rows {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `id` of the first row, as text (ids may be numeric or uuid)
    pub fn first_id(&self) -> Option<String> {
        self.data.first().and_then(|row| value_id(row))
    }
}

/// Read an `id` field as text regardless of its JSON type
pub fn value_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a PostgREST `Content-Range` header (`0-24/3573`, `*/0`) into the total count
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_encodes_postgrest_params() {
        let q = Select::from("transactions")
            .columns("date,amount,type,description,categories(name)")
            .gte("date", "2024-01-01")
            .eq("user_id", "u-1")
            .order("date", false)
            .limit(500);
        assert_eq!(
            q.to_query_pairs(),
            vec![
                ("select".to_string(), "date,amount,type,description,categories(name)".to_string()),
                ("date".to_string(), "gte.2024-01-01".to_string()),
                ("user_id".to_string(), "eq.u-1".to_string()),
                ("order".to_string(), "date.desc".to_string()),
                ("limit".to_string(), "500".to_string()),
            ]
        );
    }

    #[test]
    fn test_embedded_order_and_default_projection() {
        let q = Select::from("budgets").order("categories(name)", true).order("month", false);
        let pairs = q.to_query_pairs();
        assert_eq!(pairs[0], ("select".to_string(), "*".to_string()));
        assert_eq!(pairs[1], ("order".to_string(), "categories(name).asc,month.desc".to_string()));
    }

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_ids_read_as_text() {
        let rows = Rows {
            data: vec![json!({"id": 42})],
            count: None,
        };
        assert_eq!(rows.first_id().as_deref(), Some("42"));
        assert_eq!(value_id(&json!({"id": "c-1"})).as_deref(), Some("c-1"));
        assert_eq!(value_id(&json!({"name": "x"})), None);
    }
}
