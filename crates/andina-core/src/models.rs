use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{AndinaError, Result};

// ── Value ─────────────────────────────────────────────────────────────────────

/// A single cell of a table.
///
/// Raw tables arrive with numbers, text and dates mixed freely; coercion
/// narrows declared columns to `Number` or `Timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Convert a JSON scalar into a cell. Nested values are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric content, or `None` for anything that is not a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Normalised key used for joins and grouping labels.
    ///
    /// Integral numbers render without a fractional part so that `10` read
    /// from a CSV and `10.0` read from JSON match the same reference row.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Number(n) if !n.is_finite() => None,
            Value::Number(n) => Some(format_plain_number(*n)),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Value::Timestamp(ts) => Some(format_timestamp(ts)),
        }
    }

    /// Total ordering used when grouping and sorting:
    /// `Null < Number < Text < Timestamp`, numbers by [`f64::total_cmp`].
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::Text(_) => 2,
            Value::Timestamp(_) => 3,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{}", format_plain_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", format_timestamp(ts)),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

fn format_plain_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.num_seconds_from_midnight() == 0 && ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// ── Column ────────────────────────────────────────────────────────────────────

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` when any non-null value is text.
    pub fn is_textual(&self) -> bool {
        self.values.iter().any(|v| matches!(v, Value::Text(_)))
    }

    /// Sum of the numeric values; nulls and non-numbers count as zero.
    pub fn sum(&self) -> f64 {
        self.values.iter().filter_map(Value::as_f64).sum()
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// An immutable-by-convention tabular snapshot: ordered columns of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from columns, rejecting ragged input.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(AndinaError::RaggedColumn {
                    column: bad.name.clone(),
                    found: bad.len(),
                    expected,
                });
            }
        }
        Ok(Self { columns })
    }

    /// Build a table from row-major data. Short rows are padded with nulls,
    /// long rows are truncated to the header width.
    pub fn from_rows(names: &[String], rows: Vec<Vec<Value>>) -> Self {
        let mut columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.clone(), Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(Value::Null));
            }
        }

        Self { columns }
    }

    /// Build a table from JSON records (`[{"col": value, ...}, ...]`).
    ///
    /// Columns appear in first-seen order; a key missing from a record is null
    /// in that row. Non-object records are skipped.
    pub fn from_json_records(records: &[serde_json::Value]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            if let Some(obj) = record.as_object() {
                for key in obj.keys() {
                    if !names.iter().any(|n| n == key) {
                        names.push(key.clone());
                    }
                }
            }
        }

        let rows: Vec<Vec<Value>> = records
            .iter()
            .filter_map(|r| r.as_object())
            .map(|obj| {
                names
                    .iter()
                    .map(|n| obj.get(n).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self::from_rows(&names, rows)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Cell at (`row`, `column`), or `None` when either is out of range.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Replace a column of the same name, or append it.
    ///
    /// The column must have the table's row count unless the table has no
    /// columns yet.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.row_count() {
            return Err(AndinaError::RaggedColumn {
                column: column.name,
                found: column.values.len(),
                expected: self.row_count(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// New table holding the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    indices
                        .iter()
                        .map(|&i| c.values.get(i).cloned().unwrap_or(Value::Null))
                        .collect(),
                )
            })
            .collect();
        Table { columns }
    }

    /// New table holding the rows for which `keep(row_index)` is `true`.
    pub fn filter_rows(&self, keep: impl Fn(usize) -> bool) -> Table {
        let indices: Vec<usize> = (0..self.row_count()).filter(|&i| keep(i)).collect();
        self.take_rows(&indices)
    }

    /// Render as JSON records for report output.
    pub fn to_json_records(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = (0..self.row_count())
            .map(|i| {
                let mut obj = serde_json::Map::new();
                for column in &self.columns {
                    let cell = serde_json::to_value(&column.values[i])
                        .unwrap_or(serde_json::Value::Null);
                    obj.insert(column.name.clone(), cell);
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

// ── TableKey ──────────────────────────────────────────────────────────────────

/// Fixed names of the datasets exchanged with the acquisition and view layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKey {
    Ventas,
    Clientes,
    Productos,
    Cartera,
    Inventario,
    Importaciones,
    /// The denormalised fact table produced by enrichment.
    VentasEnriched,
}

impl TableKey {
    /// The six raw datasets every data source must provide.
    pub const RAW: [TableKey; 6] = [
        TableKey::Ventas,
        TableKey::Clientes,
        TableKey::Productos,
        TableKey::Cartera,
        TableKey::Inventario,
        TableKey::Importaciones,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKey::Ventas => "ventas",
            TableKey::Clientes => "clientes",
            TableKey::Productos => "productos",
            TableKey::Cartera => "cartera",
            TableKey::Inventario => "inventario",
            TableKey::Importaciones => "importaciones",
            TableKey::VentasEnriched => "ventas_enriched",
        }
    }

    /// File / remote table stem for a raw dataset, e.g. `ventas_andina`.
    pub fn source_stem(&self) -> String {
        format!("{}_andina", self.as_str())
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableKey {
    type Err = AndinaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ventas" => Ok(TableKey::Ventas),
            "clientes" => Ok(TableKey::Clientes),
            "productos" => Ok(TableKey::Productos),
            "cartera" => Ok(TableKey::Cartera),
            "inventario" => Ok(TableKey::Inventario),
            "importaciones" => Ok(TableKey::Importaciones),
            "ventas_enriched" => Ok(TableKey::VentasEnriched),
            other => Err(AndinaError::UnknownTable(other.to_string())),
        }
    }
}

// ── TableSet ──────────────────────────────────────────────────────────────────

/// Mapping of dataset keys to tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: BTreeMap<TableKey, Table>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding an empty table under every raw key.
    pub fn with_empty_raw() -> Self {
        let mut set = Self::new();
        for key in TableKey::RAW {
            set.insert(key, Table::empty());
        }
        set
    }

    pub fn insert(&mut self, key: TableKey, table: Table) -> Option<Table> {
        self.tables.insert(key, table)
    }

    pub fn get(&self, key: TableKey) -> Option<&Table> {
        self.tables.get(&key)
    }

    pub fn get_mut(&mut self, key: TableKey) -> Option<&mut Table> {
        self.tables.get_mut(&key)
    }

    pub fn remove(&mut self, key: TableKey) -> Option<Table> {
        self.tables.remove(&key)
    }

    pub fn contains(&self, key: TableKey) -> bool {
        self.tables.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = TableKey> + '_ {
        self.tables.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TableKey, &Table)> {
        self.tables.iter().map(|(k, t)| (*k, t))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<(TableKey, Table)> for TableSet {
    fn from_iter<I: IntoIterator<Item = (TableKey, Table)>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
