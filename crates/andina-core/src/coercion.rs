use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{Column, Table, TableKey, Value};
use crate::schema::table_spec;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses the date representations found in exported sales and ERP tables.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to turn a cell into a naive timestamp.
    ///
    /// Handles:
    /// * `Null`      → `None`
    /// * `Timestamp` → itself
    /// * `Text`      → RFC 3339 (converted to UTC), RFC 2822, or one of the
    ///   common day-first / ISO patterns.
    /// * `Number`    → Unix timestamp in seconds.
    pub fn parse(value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::Null => None,
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => Self::parse_str(s.trim()),
            Value::Number(n) if n.is_finite() => {
                let whole = n.floor();
                let mut secs = whole as i64;
                let mut nanos = ((n - whole) * 1_000_000_000.0).round() as u32;
                if nanos >= 1_000_000_000 {
                    secs += 1;
                    nanos = 0;
                }
                DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
            }
            Value::Number(_) => None,
        }
    }

    pub fn parse_str(s: &str) -> Option<NaiveDateTime> {
        if s.is_empty() {
            return None;
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.naive_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.naive_utc());
        }

        const DATETIME_FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%d/%m/%Y %H:%M:%S",
        ];
        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }

        const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }

        None
    }
}

// ── DecimalNormalizer ─────────────────────────────────────────────────────────

/// Converts numbers serialised as text, possibly with a comma decimal separator.
pub struct DecimalNormalizer;

fn numeric_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("regex is valid")
    })
}

impl DecimalNormalizer {
    /// Parse `"12,5"` / `"12.5"` / `"-3"` into a finite number.
    ///
    /// Words such as `"inf"` or `"NaN"` that `f64::from_str` would accept are
    /// rejected, so no non-finite value ever reaches a sum.
    pub fn parse_str(s: &str) -> Option<f64> {
        let candidate = s.trim().replace(',', ".");
        if !numeric_text().is_match(&candidate) {
            return None;
        }
        candidate.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// Numeric view of any cell: numbers pass through, text is parsed.
    pub fn parse(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => Self::parse_str(s),
            _ => None,
        }
    }
}

// ── CoercionReport ────────────────────────────────────────────────────────────

/// Count of non-null values that could not be coerced, per column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub nulled: BTreeMap<String, usize>,
}

impl CoercionReport {
    pub fn total_nulled(&self) -> usize {
        self.nulled.values().sum()
    }

    fn record(&mut self, column: &str, count: usize) {
        if count > 0 {
            *self.nulled.entry(column.to_string()).or_default() += count;
        }
    }

    pub fn merge(&mut self, other: CoercionReport) {
        for (column, count) in other.nulled {
            self.record(&column, count);
        }
    }
}

// ── Column / table coercion ───────────────────────────────────────────────────

/// Parse every value of the named columns into timestamps.
///
/// Values that fail to parse become `Null`; absent columns are skipped.
/// Re-running on an already coerced table changes nothing.
pub fn coerce_dates(table: &mut Table, columns: &[&str]) -> CoercionReport {
    let mut report = CoercionReport::default();
    for &name in columns {
        let Some(column) = table.column_mut(name) else {
            debug!(column = name, "date column absent; skipping");
            continue;
        };
        let failed = coerce_column(column, |v| match v {
            Value::Timestamp(_) => None,
            other => Some(TimestampProcessor::parse(other).map(Value::Timestamp)),
        });
        if failed > 0 {
            warn!(column = name, failed, "unparseable dates coerced to null");
        }
        report.record(name, failed);
    }
    report
}

/// Convert textual numeric columns, replacing a comma decimal separator.
///
/// Only columns whose runtime representation is textual are touched; a
/// column that is already numeric is left as-is.
pub fn coerce_decimals(table: &mut Table, columns: &[&str]) -> CoercionReport {
    let mut report = CoercionReport::default();
    for &name in columns {
        let Some(column) = table.column_mut(name) else {
            debug!(column = name, "decimal column absent; skipping");
            continue;
        };
        if !column.is_textual() {
            continue;
        }
        let failed = coerce_column(column, |v| match v {
            Value::Number(_) => None,
            other => Some(DecimalNormalizer::parse(other).map(Value::Number)),
        });
        if failed > 0 {
            warn!(column = name, failed, "unparseable numbers coerced to null");
        }
        report.record(name, failed);
    }
    report
}

/// Apply the declared date and decimal coercions of `key` to `table`.
pub fn coerce_table(key: TableKey, table: &mut Table) -> CoercionReport {
    let spec = table_spec(key);
    let mut report = coerce_dates(table, spec.date_columns);
    report.merge(coerce_decimals(table, spec.decimal_columns));
    debug!(
        table = %key,
        rows = table.row_count(),
        nulled = report.total_nulled(),
        "table coerced"
    );
    report
}

/// Rewrite `column` in place.
///
/// `convert` returns `None` to keep a value, or `Some(result)` where a
/// `None` result means the value could not be converted. Returns how many
/// non-null values became null.
fn coerce_column(
    column: &mut Column,
    convert: impl Fn(&Value) -> Option<Option<Value>>,
) -> usize {
    let mut failed = 0usize;
    for value in column.values.iter_mut() {
        if value.is_null() {
            continue;
        }
        match convert(value) {
            None => {}
            Some(Some(converted)) => *value = converted,
            Some(None) => {
                debug!(column = %column.name, value = %value, "value coerced to null");
                *value = Value::Null;
                failed += 1;
            }
        }
    }
    failed
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn table(columns: Vec<(&str, Vec<Value>)>) -> Table {
        Table::from_columns(
            columns
                .into_iter()
                .map(|(n, v)| Column::new(n, v))
                .collect(),
        )
        .unwrap()
    }

    // ── TimestampProcessor ───────────────────────────────────────────────────

    #[test]
    fn test_parse_null_returns_none() {
        assert!(TimestampProcessor::parse(&Value::Null).is_none());
    }

    #[test]
    fn test_parse_date_only_string() {
        let dt = TimestampProcessor::parse(&Value::from("2024-01-15")).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 15));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_z_suffix_iso() {
        let dt = TimestampProcessor::parse(&Value::from("2024-01-15T10:30:00Z")).unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_rfc3339_with_offset_converts_to_utc() {
        let dt = TimestampProcessor::parse(&Value::from("2024-03-20T14:00:00+05:00")).unwrap();
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn test_parse_day_first_slash_date() {
        let dt = TimestampProcessor::parse(&Value::from("31/01/2024")).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 31));
    }

    #[test]
    fn test_parse_unix_seconds() {
        let dt = TimestampProcessor::parse(&Value::Number(0.0)).unwrap();
        assert_eq!(dt.year(), 1970);
    }

    #[test]
    fn test_parse_fractional_unix_seconds_either_side_of_epoch() {
        let after = TimestampProcessor::parse(&Value::Number(1.5)).unwrap();
        assert_eq!(after.to_string(), "1970-01-01 00:00:01.500");
        let before = TimestampProcessor::parse(&Value::Number(-1.5)).unwrap();
        assert_eq!(before.to_string(), "1969-12-31 23:59:58.500");
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(TimestampProcessor::parse(&Value::from("no-es-fecha")).is_none());
        assert!(TimestampProcessor::parse(&Value::from("")).is_none());
        assert!(TimestampProcessor::parse(&Value::Number(f64::NAN)).is_none());
    }

    // ── DecimalNormalizer ────────────────────────────────────────────────────

    #[test]
    fn test_decimal_comma() {
        assert_eq!(DecimalNormalizer::parse_str("12,5"), Some(12.5));
        assert_eq!(DecimalNormalizer::parse_str(" 1500 "), Some(1500.0));
        assert_eq!(DecimalNormalizer::parse_str("-0,25"), Some(-0.25));
    }

    #[test]
    fn test_decimal_rejects_words_and_grouping() {
        assert_eq!(DecimalNormalizer::parse_str("inf"), None);
        assert_eq!(DecimalNormalizer::parse_str("NaN"), None);
        assert_eq!(DecimalNormalizer::parse_str("1.234,5"), None);
        assert_eq!(DecimalNormalizer::parse_str(""), None);
    }

    // ── coerce_dates ─────────────────────────────────────────────────────────

    #[test]
    fn test_coerce_dates_nulls_unparseable() {
        let mut t = table(vec![(
            "fecha",
            vec![Value::from("2024-01-15"), Value::from("ayer"), Value::Null],
        )]);
        let report = coerce_dates(&mut t, &["fecha"]);

        let col = t.column("fecha").unwrap();
        assert!(matches!(col.values[0], Value::Timestamp(_)));
        assert_eq!(col.values[1], Value::Null);
        assert_eq!(col.values[2], Value::Null);
        assert_eq!(report.nulled.get("fecha"), Some(&1));
    }

    #[test]
    fn test_coerce_dates_skips_absent_column() {
        let mut t = table(vec![("otra", vec![Value::from("x")])]);
        let report = coerce_dates(&mut t, &["fecha"]);
        assert_eq!(report.total_nulled(), 0);
        assert_eq!(t.value(0, "otra"), Some(&Value::from("x")));
    }

    // ── coerce_decimals ──────────────────────────────────────────────────────

    #[test]
    fn test_coerce_decimals_textual_column() {
        let mut t = table(vec![(
            "flete_usd",
            vec![Value::from("10,5"), Value::from("n/a"), Value::Number(3.0)],
        )]);
        let report = coerce_decimals(&mut t, &["flete_usd"]);

        let col = t.column("flete_usd").unwrap();
        assert_eq!(col.values[0], Value::Number(10.5));
        assert_eq!(col.values[1], Value::Null);
        assert_eq!(col.values[2], Value::Number(3.0));
        assert_eq!(report.total_nulled(), 1);
    }

    #[test]
    fn test_coerce_decimals_leaves_numeric_column() {
        let mut t = table(vec![("flete_usd", vec![Value::Number(1.25), Value::Null])]);
        let before = t.clone();
        coerce_decimals(&mut t, &["flete_usd"]);
        assert_eq!(t, before);
    }

    // ── coerce_table ─────────────────────────────────────────────────────────

    #[test]
    fn test_coerce_table_is_idempotent() {
        let mut t = table(vec![
            (
                "fecha_orden",
                vec![Value::from("2024-01-02"), Value::from("basura"), Value::Null],
            ),
            (
                "costo_mercancia_usd",
                vec![Value::from("1,5"), Value::Number(2.0), Value::from("x")],
            ),
            ("proveedor", vec![Value::from("A"), Value::from("B"), Value::from("C")]),
        ]);
        coerce_table(TableKey::Importaciones, &mut t);
        let once = t.clone();

        let report = coerce_table(TableKey::Importaciones, &mut t);
        assert_eq!(t, once);
        assert_eq!(report.total_nulled(), 0);
        assert_eq!(t.value(0, "proveedor"), Some(&Value::from("A")));
    }

    #[test]
    fn test_coerce_table_ventas_ignores_decimals() {
        let mut t = table(vec![("subtotal_cop", vec![Value::from("1,5")])]);
        coerce_table(TableKey::Ventas, &mut t);
        assert_eq!(t.value(0, "subtotal_cop"), Some(&Value::from("1,5")));
    }
}
