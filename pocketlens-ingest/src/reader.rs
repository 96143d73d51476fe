//! Read arbitrary delimited text with a header row into a [`Table`].
//!
//! No fixed schema: unknown columns are carried through, ragged rows are padded,
//! blank lines are skipped. The delimiter is sniffed from the header line.

use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::types::Table;

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Pick the delimiter that occurs most often in the header line (default `,`).
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    let mut best = b',';
    let mut best_count = 0;
    for d in CANDIDATE_DELIMITERS {
        let count = header.bytes().filter(|b| *b == d).count();
        if count > best_count {
            best = d;
            best_count = count;
        }
    }
    best
}

/// Parse CSV text into a table. Errors only when there is no header row or the
/// text is not valid delimited data.
pub fn read_table(text: &str) -> Result<Table> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = sniff_delimiter(text);

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for result in rdr.records() {
        let record = result.context("reading csv record")?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        match headers {
            None => headers = Some(record.iter().map(|s| s.to_string()).collect()),
            Some(ref h) => {
                let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
                row.resize(h.len().max(row.len()), String::new());
                rows.push(row);
            }
        }
    }

    let Some(headers) = headers else {
        bail!("csv has no header row");
    };

    Ok(Table { headers, rows })
}

pub fn read_table_from_path(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("opening {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    read_table(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_headers_and_rows() {
        let table = read_table("Date, Amount ,Type\n2024-01-05,\"1,200\",debit\n").unwrap();
        assert_eq!(table.headers, vec!["Date", "Amount", "Type"]);
        assert_eq!(table.rows, vec![vec!["2024-01-05", "1,200", "debit"]]);
    }

    #[test]
    fn test_sniffs_semicolon_and_tab() {
        assert_eq!(sniff_delimiter("date;amount;type\n"), b';');
        assert_eq!(sniff_delimiter("date\tamount\ttype\n"), b'\t');
        assert_eq!(sniff_delimiter("date|amount\n"), b'|');
        assert_eq!(sniff_delimiter("date\n"), b',');

        let table = read_table("date;amount\n2024-01-05;10,50\n").unwrap();
        assert_eq!(table.rows[0], vec!["2024-01-05", "10,50"]);
    }

    #[test]
    fn test_strips_bom_and_skips_blank_lines() {
        let table = read_table("\u{feff}date,amount\n\n2024-01-05,5\n,\n").unwrap();
        assert_eq!(table.headers[0], "date");
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_pads_short_rows() {
        let table = read_table("date,amount,type\n2024-01-05,5\n").unwrap();
        assert_eq!(table.rows[0], vec!["2024-01-05", "5", ""]);
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(read_table("").is_err());
        assert!(read_table("\n\n").is_err());
    }
}
