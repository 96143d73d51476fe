//! pocketlens-ingest: CSV statement ingestion. Arbitrary bank and budget exports go in,
//! canonical transaction/budget records come out.
//!
//! Pipeline: [`reader`] → [`columns`] → [`values`] → [`classify`] → [`records`].

pub mod types;
pub mod reader;
pub mod columns;
pub mod values;
pub mod classify;
pub mod records;

pub use types::{NormalizedTable, RawRow, Table};
pub use reader::{read_table, read_table_from_path};
pub use columns::ColumnNormalizer;
pub use classify::classify_kind;
pub use records::{build_budgets, build_transactions, ingest_budgets_csv, ingest_transactions_csv};
