//! Group-and-rank helpers consumed by the dashboard views.
//!
//! Every function is a pure `Table -> Table` (or `Table -> scalar`) transform.
//! Grouping follows the usual dataframe conventions: rows with a null key are
//! dropped, groups come out ordered by key, and sums treat nulls as zero.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use andina_core::coercion::TimestampProcessor;
use andina_core::error::{AndinaError, Result};
use andina_core::models::{Column, Table, Value};
use andina_core::time_utils::days_between;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

// ── Column access ─────────────────────────────────────────────────────────────

pub(crate) fn require<'a>(table: &'a Table, name: &str) -> Result<&'a Column> {
    table
        .column(name)
        .ok_or_else(|| AndinaError::MissingColumn(name.to_string()))
}

// ── GroupKey ──────────────────────────────────────────────────────────────────

/// Composite grouping key with the total ordering of [`Value::total_cmp`].
#[derive(Debug, Clone)]
struct GroupKey(Vec<Value>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// One output column of [`group_aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Sum of a numeric column, written under the same name.
    Sum(String),
    /// Mean of the numeric values of a column, written under the same name.
    Mean(String),
    /// Number of non-null values of `column`, written as `alias`.
    Count { column: String, alias: String },
    /// Number of distinct non-null values of `column`, written as `alias`.
    CountDistinct { column: String, alias: String },
}

impl Aggregation {
    pub fn sum(column: &str) -> Self {
        Aggregation::Sum(column.to_string())
    }

    pub fn mean(column: &str) -> Self {
        Aggregation::Mean(column.to_string())
    }

    pub fn count(column: &str, alias: &str) -> Self {
        Aggregation::Count {
            column: column.to_string(),
            alias: alias.to_string(),
        }
    }

    pub fn count_distinct(column: &str, alias: &str) -> Self {
        Aggregation::CountDistinct {
            column: column.to_string(),
            alias: alias.to_string(),
        }
    }

    fn source(&self) -> &str {
        match self {
            Aggregation::Sum(c) | Aggregation::Mean(c) => c,
            Aggregation::Count { column, .. } | Aggregation::CountDistinct { column, .. } => column,
        }
    }

    fn output_name(&self) -> &str {
        match self {
            Aggregation::Sum(c) | Aggregation::Mean(c) => c,
            Aggregation::Count { alias, .. } | Aggregation::CountDistinct { alias, .. } => alias,
        }
    }
}

/// Running state for one aggregation within one group.
#[derive(Debug, Clone)]
enum Accumulator {
    Sum(f64),
    Mean { total: f64, n: usize },
    Count(usize),
    Distinct(BTreeSet<String>),
}

impl Accumulator {
    fn for_aggregation(agg: &Aggregation) -> Self {
        match agg {
            Aggregation::Sum(_) => Accumulator::Sum(0.0),
            Aggregation::Mean(_) => Accumulator::Mean { total: 0.0, n: 0 },
            Aggregation::Count { .. } => Accumulator::Count(0),
            Aggregation::CountDistinct { .. } => Accumulator::Distinct(BTreeSet::new()),
        }
    }

    fn add(&mut self, value: &Value) {
        match self {
            Accumulator::Sum(total) => *total += value.as_f64().unwrap_or(0.0),
            Accumulator::Mean { total, n } => {
                if let Some(v) = value.as_f64() {
                    *total += v;
                    *n += 1;
                }
            }
            Accumulator::Count(n) => {
                if !value.is_null() {
                    *n += 1;
                }
            }
            Accumulator::Distinct(seen) => {
                if let Some(key) = value.key() {
                    seen.insert(key);
                }
            }
        }
    }

    fn finish(&self) -> Value {
        match self {
            Accumulator::Sum(total) => Value::Number(*total),
            Accumulator::Mean { n: 0, .. } => Value::Null,
            Accumulator::Mean { total, n } => Value::Number(*total / *n as f64),
            Accumulator::Count(n) => Value::Number(*n as f64),
            Accumulator::Distinct(seen) => Value::Number(seen.len() as f64),
        }
    }
}

/// Group `table` by `keys` and compute `aggs` per group.
///
/// The output has the key columns followed by one column per aggregation,
/// with one row per distinct key combination in ascending key order.
pub fn group_aggregate(table: &Table, keys: &[&str], aggs: &[Aggregation]) -> Result<Table> {
    let key_cols: Vec<&Column> = keys
        .iter()
        .map(|k| require(table, k))
        .collect::<Result<_>>()?;
    let agg_cols: Vec<&Column> = aggs
        .iter()
        .map(|a| require(table, a.source()))
        .collect::<Result<_>>()?;

    let mut groups: BTreeMap<GroupKey, Vec<Accumulator>> = BTreeMap::new();
    for row in 0..table.row_count() {
        let key: Vec<Value> = key_cols.iter().map(|c| c.values[row].clone()).collect();
        if key.iter().any(Value::is_null) {
            continue;
        }
        let accs = groups
            .entry(GroupKey(key))
            .or_insert_with(|| aggs.iter().map(Accumulator::for_aggregation).collect());
        for (acc, col) in accs.iter_mut().zip(agg_cols.iter()) {
            acc.add(&col.values[row]);
        }
    }

    let mut columns: Vec<Column> = keys
        .iter()
        .map(|k| Column::new(*k, Vec::with_capacity(groups.len())))
        .chain(
            aggs.iter()
                .map(|a| Column::new(a.output_name(), Vec::with_capacity(groups.len()))),
        )
        .collect();

    for (key, accs) in groups {
        for (i, v) in key.0.into_iter().enumerate() {
            columns[i].values.push(v);
        }
        for (j, acc) in accs.iter().enumerate() {
            columns[keys.len() + j].values.push(acc.finish());
        }
    }

    Table::from_columns(columns)
}

/// Sum `measure` per value of `dimension`, as `(label, total)` pairs in
/// ascending label order. Null dimensions are dropped.
pub fn group_sum(table: &Table, dimension: &str, measure: &str) -> Result<Vec<(String, f64)>> {
    let grouped = group_aggregate(table, &[dimension], &[Aggregation::sum(measure)])?;
    Ok(labelled_pairs(&grouped, dimension, measure))
}

/// Mean of `measure` per value of `dimension`, as `(label, mean)` pairs.
/// Groups with no numeric value are omitted.
pub fn group_mean(table: &Table, dimension: &str, measure: &str) -> Result<Vec<(String, f64)>> {
    let grouped = group_aggregate(table, &[dimension], &[Aggregation::mean(measure)])?;
    Ok(labelled_pairs(&grouped, dimension, measure))
}

/// `(label, value)` pairs read from two columns of a grouped table.
pub fn labelled_pairs(table: &Table, label: &str, measure: &str) -> Vec<(String, f64)> {
    let (Some(labels), Some(values)) = (table.column(label), table.column(measure)) else {
        return Vec::new();
    };
    labels
        .values
        .iter()
        .zip(values.values.iter())
        .filter_map(|(l, v)| Some((l.to_string(), v.as_f64()?)))
        .collect()
}

// ── Sorting and ranking ───────────────────────────────────────────────────────

/// Rows ordered by `column`; nulls last. The sort is stable, so ties keep
/// their original order.
pub fn sort_by(table: &Table, column: &str, descending: bool) -> Result<Table> {
    let col = require(table, column)?;
    let mut indices: Vec<usize> = (0..table.row_count()).collect();
    indices.sort_by(|&a, &b| {
        let (va, vb) = (&col.values[a], &col.values[b]);
        match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if descending => vb.total_cmp(va),
            (false, false) => va.total_cmp(vb),
        }
    });
    Ok(table.take_rows(&indices))
}

/// The `n` rows with the largest `measure`; ties keep original order.
pub fn top_n(table: &Table, measure: &str, n: usize) -> Result<Table> {
    let sorted = sort_by(table, measure, true)?;
    let keep: Vec<usize> = (0..sorted.row_count().min(n)).collect();
    Ok(sorted.take_rows(&keep))
}

/// `(label, value)` pairs sorted by value descending and truncated to `n`.
/// Ties keep their incoming order.
pub fn rank_pairs(mut pairs: Vec<(String, f64)>, n: usize) -> Vec<(String, f64)> {
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs.truncate(n);
    pairs
}

/// Append `name = numerator / denominator * scale`, with `0` wherever the
/// denominator is zero or either side is null.
pub fn with_ratio(
    table: &Table,
    numerator: &str,
    denominator: &str,
    name: &str,
    scale: f64,
) -> Result<Table> {
    let num = require(table, numerator)?;
    let den = require(table, denominator)?;
    let values = num
        .values
        .iter()
        .zip(den.values.iter())
        .map(|(n, d)| Value::Number(safe_ratio(n.as_f64(), d.as_f64()) * scale))
        .collect();
    let mut out = table.clone();
    out.set_column(Column::new(name, values))?;
    Ok(out)
}

/// `numerator / denominator`, or `0` when either is missing or the
/// denominator is zero.
pub fn safe_ratio(numerator: Option<f64>, denominator: Option<f64>) -> f64 {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => {
            let r = n / d;
            if r.is_finite() {
                r
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

// ── Leaderboard ───────────────────────────────────────────────────────────────

/// Definition of a grouped ranking with a margin-percentage column.
#[derive(Debug, Clone)]
pub struct LeaderboardSpec<'a> {
    pub keys: &'a [&'a str],
    pub revenue: &'a str,
    pub margin: &'a str,
    /// Further columns summed per group (e.g. quantity).
    pub extra_sums: &'a [&'a str],
    /// Optional `(column, alias)` counted per group (e.g. transactions).
    pub count: Option<(&'a str, &'a str)>,
    /// Name of the margin percentage column.
    pub ratio_name: &'a str,
    /// Column to rank by, descending.
    pub sort_by: &'a str,
    pub top_n: Option<usize>,
}

/// Group, sum revenue and margin, add `margin / revenue * 100` (0 on zero
/// revenue), sort descending and keep the top rows.
pub fn leaderboard(table: &Table, spec: &LeaderboardSpec<'_>) -> Result<Table> {
    let mut aggs = vec![Aggregation::sum(spec.revenue), Aggregation::sum(spec.margin)];
    aggs.extend(spec.extra_sums.iter().map(|c| Aggregation::sum(c)));
    if let Some((column, alias)) = spec.count {
        aggs.push(Aggregation::count(column, alias));
    }

    let grouped = group_aggregate(table, spec.keys, &aggs)?;
    let with_pct = with_ratio(&grouped, spec.margin, spec.revenue, spec.ratio_name, 100.0)?;
    match spec.top_n {
        Some(n) => top_n(&with_pct, spec.sort_by, n),
        None => sort_by(&with_pct, spec.sort_by, true),
    }
}

// ── Latest snapshot ───────────────────────────────────────────────────────────

/// Rows of a time-versioned table at its most recent cut-off date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub date: NaiveDateTime,
    pub table: Table,
    /// Keys (joined with `|`) that occur more than once at the latest date.
    pub duplicate_keys: Vec<String>,
}

/// Select every row whose `date_col` equals the maximum date present.
///
/// All rows sharing the latest date are included. When `unique_by` names
/// columns, duplicated key combinations at that date are reported in
/// [`Snapshot::duplicate_keys`] since summing them would inflate totals.
pub fn latest_snapshot(table: &Table, date_col: &str, unique_by: &[&str]) -> Result<Snapshot> {
    let dates: Vec<Option<NaiveDateTime>> = require(table, date_col)?
        .values
        .iter()
        .map(TimestampProcessor::parse)
        .collect();

    let latest = dates
        .iter()
        .flatten()
        .max()
        .copied()
        .ok_or_else(|| no_dates(date_col))?;

    let snapshot = table.filter_rows(|i| dates[i] == Some(latest));

    let mut duplicate_keys = Vec::new();
    if !unique_by.is_empty() {
        let key_cols: Vec<&Column> = unique_by
            .iter()
            .map(|k| require(&snapshot, k))
            .collect::<Result<_>>()?;
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for row in 0..snapshot.row_count() {
            let key = key_cols
                .iter()
                .map(|c| c.values[row].key().unwrap_or_default())
                .collect::<Vec<_>>()
                .join("|");
            *seen.entry(key).or_default() += 1;
        }
        duplicate_keys = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| k)
            .collect();
        if !duplicate_keys.is_empty() {
            warn!(
                date = %latest,
                duplicates = duplicate_keys.len(),
                "latest snapshot holds duplicate keys; totals include every copy"
            );
        }
    }

    Ok(Snapshot {
        date: latest,
        table: snapshot,
        duplicate_keys,
    })
}

/// Most recent parseable date in `date_col`.
pub fn max_date(table: &Table, date_col: &str) -> Result<NaiveDateTime> {
    require(table, date_col)?
        .values
        .iter()
        .filter_map(TimestampProcessor::parse)
        .max()
        .ok_or_else(|| no_dates(date_col))
}

fn no_dates(date_col: &str) -> AndinaError {
    AndinaError::InsufficientData(format!("no dates in '{}'", date_col))
}

// ── Lead time ─────────────────────────────────────────────────────────────────

/// Append `name` = whole days from `order_col` to `arrival_col` (null when
/// either date is missing).
pub fn with_lead_time(table: &Table, order_col: &str, arrival_col: &str, name: &str) -> Result<Table> {
    let order = require(table, order_col)?;
    let arrival = require(table, arrival_col)?;
    let values = order
        .values
        .iter()
        .zip(arrival.values.iter())
        .map(|(o, a)| {
            match (TimestampProcessor::parse(o), TimestampProcessor::parse(a)) {
                (Some(start), Some(end)) => Value::Number(days_between(start, end) as f64),
                _ => Value::Null,
            }
        })
        .collect();
    let mut out = table.clone();
    out.set_column(Column::new(name, values))?;
    Ok(out)
}

/// Summary statistics over lead times in days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
}

impl LeadTimeStats {
    /// Statistics over the numeric values of `column`; `None` when empty.
    pub fn from_column(column: &Column) -> Option<Self> {
        let mut values: Vec<f64> = column.values.iter().filter_map(Value::as_f64).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let count = values.len();
        Some(Self {
            count,
            mean: values.iter().sum::<f64>() / count as f64,
            median: percentile(&values, 50.0),
            p90: percentile(&values, 90.0),
            min: values[0],
            max: values[count - 1],
        })
    }
}

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation between closest ranks.
///
/// Returns `0.0` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let len = sorted_data.len();
    if len == 1 {
        return sorted_data[0];
    }
    let rank = (p / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted_data[lo];
    }
    let frac = rank - lo as f64;
    sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo])
}

// ── Scalar KPIs ───────────────────────────────────────────────────────────────

/// Sum of a numeric column; `0` when the column is absent.
pub fn sum(table: &Table, column: &str) -> f64 {
    table.column(column).map(Column::sum).unwrap_or(0.0)
}

/// Mean of the numeric values of a column; `None` when absent or empty.
pub fn mean(table: &Table, column: &str) -> Option<f64> {
    let values: Vec<f64> = table
        .column(column)?
        .values
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Number of distinct non-null values in a column.
pub fn count_distinct(table: &Table, column: &str) -> usize {
    table
        .column(column)
        .map(|c| c.values.iter().filter_map(Value::key).collect::<BTreeSet<_>>().len())
        .unwrap_or(0)
}

/// Rows whose `column` equals `expected` (compared by key).
pub fn filter_eq(table: &Table, column: &str, expected: &str) -> Result<Table> {
    let col = require(table, column)?;
    Ok(table.filter_rows(|i| col.values[i].key().as_deref() == Some(expected)))
}

/// Number of rows whose `column` equals `expected`.
pub fn count_where_eq(table: &Table, column: &str, expected: &str) -> Result<usize> {
    Ok(filter_eq(table, column, expected)?.row_count())
}

/// Sorted distinct non-null labels of a column.
pub fn distinct_values(table: &Table, column: &str) -> Vec<String> {
    table
        .column(column)
        .map(|c| {
            c.values
                .iter()
                .filter_map(Value::key)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn table(columns: Vec<(&str, Vec<Value>)>) -> Table {
        Table::from_columns(columns.into_iter().map(|(n, v)| Column::new(n, v)).collect()).unwrap()
    }

    fn sales() -> Table {
        table(vec![
            (
                "cliente",
                vec![text("B"), text("A"), text("B"), Value::Null, text("C")],
            ),
            ("subtotal", vec![num(100.0), num(50.0), num(300.0), num(7.0), num(0.0)]),
            ("margen", vec![num(10.0), num(20.0), Value::Null, num(1.0), num(5.0)]),
            ("venta_id", vec![num(1.0), num(2.0), num(3.0), num(4.0), num(5.0)]),
        ])
    }

    // ── group_aggregate ──────────────────────────────────────────────────────

    #[test]
    fn test_group_aggregate_sorted_keys_and_null_drop() {
        let g = group_aggregate(
            &sales(),
            &["cliente"],
            &[Aggregation::sum("subtotal"), Aggregation::count("venta_id", "transacciones")],
        )
        .unwrap();

        assert_eq!(g.row_count(), 3);
        assert_eq!(g.column_names(), vec!["cliente", "subtotal", "transacciones"]);
        assert_eq!(g.value(0, "cliente"), Some(&text("A")));
        assert_eq!(g.value(1, "subtotal"), Some(&num(400.0)));
        assert_eq!(g.value(1, "transacciones"), Some(&num(2.0)));
    }

    #[test]
    fn test_group_aggregate_sum_treats_null_as_zero() {
        let g = group_aggregate(&sales(), &["cliente"], &[Aggregation::sum("margen")]).unwrap();
        assert_eq!(g.value(1, "margen"), Some(&num(10.0)));
    }

    #[test]
    fn test_group_aggregate_mean_and_distinct() {
        let t = table(vec![
            ("proveedor", vec![text("X"), text("X"), text("Y")]),
            ("dias", vec![num(10.0), num(20.0), Value::Null]),
            ("producto", vec![num(1.0), num(1.0), num(2.0)]),
        ]);
        let g = group_aggregate(
            &t,
            &["proveedor"],
            &[Aggregation::mean("dias"), Aggregation::count_distinct("producto", "skus")],
        )
        .unwrap();
        assert_eq!(g.value(0, "dias"), Some(&num(15.0)));
        assert_eq!(g.value(0, "skus"), Some(&num(1.0)));
        assert_eq!(g.value(1, "dias"), Some(&Value::Null));
    }

    #[test]
    fn test_group_aggregate_missing_column() {
        let err = group_aggregate(&sales(), &["region"], &[]).unwrap_err();
        assert!(matches!(err, AndinaError::MissingColumn(c) if c == "region"));
    }

    #[test]
    fn test_group_sum_pairs() {
        let pairs = group_sum(&sales(), "cliente", "subtotal").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), 50.0),
                ("B".to_string(), 400.0),
                ("C".to_string(), 0.0)
            ]
        );
    }

    // ── sorting / top_n ──────────────────────────────────────────────────────

    #[test]
    fn test_top_n_stable_ties() {
        let t = table(vec![
            ("id", vec![text("a"), text("b"), text("c"), text("d")]),
            ("v", vec![num(5.0), num(9.0), num(5.0), Value::Null]),
        ]);
        let top = top_n(&t, "v", 3).unwrap();
        let ids: Vec<String> = top.column("id").unwrap().values.iter().map(|v| v.to_string()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_ascending_nulls_last() {
        let t = table(vec![("v", vec![Value::Null, num(3.0), num(1.0)])]);
        let sorted = sort_by(&t, "v", false).unwrap();
        assert_eq!(sorted.column("v").unwrap().values, vec![num(1.0), num(3.0), Value::Null]);
    }

    #[test]
    fn test_rank_pairs() {
        let ranked = rank_pairs(
            vec![("a".into(), 1.0), ("b".into(), 3.0), ("c".into(), 3.0)],
            2,
        );
        assert_eq!(ranked, vec![("b".to_string(), 3.0), ("c".to_string(), 3.0)]);
    }

    // ── ratios ───────────────────────────────────────────────────────────────

    #[test]
    fn test_with_ratio_guards_zero_and_null() {
        let r = with_ratio(&sales(), "margen", "subtotal", "pct", 100.0).unwrap();
        let pct = &r.column("pct").unwrap().values;
        assert_eq!(pct[0], num(10.0));
        assert_eq!(pct[2], num(0.0));
        assert_eq!(pct[4], num(0.0));
    }

    #[test]
    fn test_safe_ratio() {
        assert_eq!(safe_ratio(Some(1.0), Some(4.0)), 0.25);
        assert_eq!(safe_ratio(Some(1.0), Some(0.0)), 0.0);
        assert_eq!(safe_ratio(None, Some(2.0)), 0.0);
    }

    // ── leaderboard ──────────────────────────────────────────────────────────

    #[test]
    fn test_leaderboard() {
        let spec = LeaderboardSpec {
            keys: &["cliente"],
            revenue: "subtotal",
            margin: "margen",
            extra_sums: &[],
            count: Some(("venta_id", "transacciones")),
            ratio_name: "profit_margin",
            sort_by: "subtotal",
            top_n: Some(2),
        };
        let board = leaderboard(&sales(), &spec).unwrap();
        assert_eq!(board.row_count(), 2);
        assert_eq!(board.value(0, "cliente"), Some(&text("B")));
        assert_eq!(board.value(0, "profit_margin"), Some(&num(2.5)));
        assert_eq!(board.value(1, "cliente"), Some(&text("A")));
        assert_eq!(board.value(1, "profit_margin"), Some(&num(40.0)));
    }

    // ── latest_snapshot ──────────────────────────────────────────────────────

    #[test]
    fn test_latest_snapshot_selects_max_date() {
        let t = table(vec![
            ("fecha_corte", vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 2, 29)]),
            ("producto_id", vec![num(1.0), num(1.0), num(2.0)]),
            ("valor", vec![num(10.0), num(20.0), num(30.0)]),
        ]);
        let snap = latest_snapshot(&t, "fecha_corte", &["producto_id"]).unwrap();
        assert_eq!(snap.table.row_count(), 2);
        assert_eq!(sum(&snap.table, "valor"), 50.0);
        assert!(snap.duplicate_keys.is_empty());
    }

    #[test]
    fn test_latest_snapshot_reports_duplicates() {
        let t = table(vec![
            ("fecha_corte", vec![text("2024-02-29"), text("2024-02-29")]),
            ("producto_id", vec![num(7.0), num(7.0)]),
            ("valor", vec![num(10.0), num(10.0)]),
        ]);
        let snap = latest_snapshot(&t, "fecha_corte", &["producto_id"]).unwrap();
        assert_eq!(snap.table.row_count(), 2);
        assert_eq!(snap.duplicate_keys, vec!["7".to_string()]);
    }

    #[test]
    fn test_max_date() {
        let t = table(vec![("f", vec![text("2024-03-01"), Value::Null, date(2024, 5, 2)])]);
        assert_eq!(max_date(&t, "f").unwrap().to_string(), "2024-05-02 00:00:00");
        assert!(max_date(&t, "g").is_err());
    }

    #[test]
    fn test_latest_snapshot_without_dates() {
        let t = table(vec![("fecha_corte", vec![Value::Null, text("x")])]);
        let err = latest_snapshot(&t, "fecha_corte", &[]).unwrap_err();
        assert!(matches!(err, AndinaError::InsufficientData(_)));
    }

    // ── lead time ────────────────────────────────────────────────────────────

    #[test]
    fn test_with_lead_time_and_stats() {
        let t = table(vec![
            ("fecha_orden", vec![date(2024, 1, 1), date(2024, 1, 1), date(2024, 1, 1)]),
            ("fecha_llegada", vec![date(2024, 1, 11), date(2024, 1, 31), Value::Null]),
        ]);
        let out = with_lead_time(&t, "fecha_orden", "fecha_llegada", "lead_time_days").unwrap();
        let col = out.column("lead_time_days").unwrap();
        assert_eq!(col.values, vec![num(10.0), num(30.0), Value::Null]);

        let stats = LeadTimeStats::from_column(col).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.median, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert!((stats.p90 - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[], 90.0), 0.0);
        assert_eq!(percentile(&[4.0], 90.0), 4.0);
        assert!((percentile(&[1.0, 2.0, 3.0, 4.0], 50.0) - 2.5).abs() < 1e-9);
    }

    // ── scalar helpers ───────────────────────────────────────────────────────

    #[test]
    fn test_scalar_helpers() {
        let t = sales();
        assert_eq!(sum(&t, "subtotal"), 457.0);
        assert_eq!(sum(&t, "missing"), 0.0);
        assert_eq!(count_distinct(&t, "cliente"), 3);
        assert_eq!(count_where_eq(&t, "cliente", "B").unwrap(), 2);
        assert_eq!(distinct_values(&t, "cliente"), vec!["A", "B", "C"]);
        assert!((mean(&t, "margen").unwrap() - 9.0).abs() < 1e-9);
    }
}
