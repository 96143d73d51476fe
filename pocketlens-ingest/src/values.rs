//! Value coercion for free-form CSV cells. Every parser here is total: bad input
//! yields `None` and the row is dropped later by the record builder.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Currency glyph stripped from amounts before parsing
pub const CURRENCY_GLYPH: char = '₹';

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<a>[0-9]{1,4})[/.\-](?P<b>[0-9]{1,2})[/.\-](?P<c>[0-9]{1,4})$").expect("numeric date regex")
});

static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<y>[0-9]{4})-(?P<m>[0-9]{1,2})$").expect("year-month regex"));

const NAMED_MONTH_FORMATS: &[&str] = &[
    "%d %B %Y",
    "%B %d %Y",
    "%Y %B %d",
    "%d %B %y",
    "%B %d %y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn plausible(d: NaiveDate) -> Option<NaiveDate> {
    (1000..=9999).contains(&d.year()).then_some(d)
}

fn expand_year(y: &str) -> Option<i32> {
    let n: i32 = y.parse().ok()?;
    match y.len() {
        4 => Some(n),
        // same pivot as strftime's %y
        2 if n < 70 => Some(2000 + n),
        2 => Some(1900 + n),
        _ => None,
    }
}

/// `2024-01-05`, `2024/1/5`, `01/05/2024` (month first), `25/12/2024` (day first
/// when the month-first reading is impossible), `1-5-24`.
fn parse_numeric(s: &str) -> Option<NaiveDate> {
    let caps = NUMERIC_DATE.captures(s)?;
    let (a, b, c) = (&caps["a"], &caps["b"], &caps["c"]);

    if a.len() == 4 {
        if c.len() > 2 {
            return None;
        }
        return NaiveDate::from_ymd_opt(a.parse().ok()?, b.parse().ok()?, c.parse().ok()?);
    }

    if a.len() > 2 {
        return None;
    }
    let year = expand_year(c)?;
    let first: u32 = a.parse().ok()?;
    let second: u32 = b.parse().ok()?;
    NaiveDate::from_ymd_opt(year, first, second).or_else(|| NaiveDate::from_ymd_opt(year, second, first))
}

fn parse_named_month(s: &str) -> Option<NaiveDate> {
    if !s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let flattened: String = s
        .chars()
        .map(|c| if matches!(c, ',' | '-' | '/' | '.') { ' ' } else { c })
        .collect();
    let flattened = flattened.split_whitespace().collect::<Vec<_>>().join(" ");

    NAMED_MONTH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&flattened, fmt).ok().and_then(plausible))
}

fn parse_datetime(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Parse a human-readable date. Never fails loudly; unparseable input is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok().and_then(plausible);
    }

    if let Some(d) = parse_numeric(s).or_else(|| parse_named_month(s)).or_else(|| parse_datetime(s)) {
        return plausible(d);
    }

    // "01/05/2024 10:30" and similar: retry on the date part alone
    let head = s.split([' ', 'T']).next().unwrap_or("");
    if head.len() < s.len() && head.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_numeric(head).and_then(plausible);
    }

    None
}

/// Parse an amount cell: drop thousands separators and the currency glyph, then read
/// a float. Non-finite values are rejected; the magnitude is returned.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && *c != CURRENCY_GLYPH)
        .collect();
    let value: f64 = cleaned.trim().parse().ok()?;
    value.is_finite().then(|| value.abs())
}

/// Parse a budget month. `YYYY-MM` becomes the first of that month; any other
/// parseable date is kept exactly as given.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Some(caps) = YEAR_MONTH.captures(s) {
        let year: i32 = caps["y"].parse().ok()?;
        let month: u32 = caps["m"].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    parse_date(s)
}

/// Title-case a label: the first letter of every alphabetic run is upper-cased,
/// the rest lower-cased (`"eating-out"` → `"Eating-Out"`).
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
