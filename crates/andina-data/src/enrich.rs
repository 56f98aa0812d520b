//! Join engine producing the enriched sales fact table.
//!
//! Sales are left-joined to products on `producto_id` and then to customers on
//! `cliente_id`. Sales columns keep their names; a reference column whose name
//! is already taken is kept as `<name>_master` (then `_master_2`, ...).
//! Reference keys are de-duplicated before the join, first occurrence wins, so
//! the fact table always has exactly one row per sale.

use std::collections::{BTreeMap, BTreeSet};

use andina_core::models::{Column, Table, TableKey, Value};
use andina_core::schema::{CUSTOMER_ID, MARGIN, MARGIN_RATIO, MASTER_SUFFIX, PRODUCT_ID, REVENUE};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::aggregator::with_ratio;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why no fact table could be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    #[error("{table} has no '{column}' column")]
    MissingColumn { table: TableKey, column: String },

    #[error("sales table has no rows")]
    EmptySales,
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// Outcome of one left join against a reference table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub key: String,
    /// Reference keys that occur more than once; only the first row is used.
    pub duplicate_keys: Vec<String>,
    /// Sales rows whose key has no reference row (or is null).
    pub unmatched_rows: usize,
    /// Reference columns renamed because the sales side already used the name.
    pub renamed: Vec<(String, String)>,
}

/// Per-reference join statistics of one enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub joins: BTreeMap<TableKey, JoinStats>,
}

impl JoinReport {
    /// `true` when any reference table had duplicated keys.
    pub fn has_duplicates(&self) -> bool {
        self.joins.values().any(|j| !j.duplicate_keys.is_empty())
    }
}

/// The fact table plus what happened while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub table: Table,
    pub report: JoinReport,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Build the enriched sales table.
///
/// The output has the sales row count and order. `margen_pct` is appended
/// when both revenue and margin columns exist (0 where revenue is 0 or null).
pub fn enrich(
    sales: &Table,
    products: &Table,
    customers: &Table,
) -> Result<Enrichment, EnrichError> {
    require_key(sales, TableKey::Ventas, PRODUCT_ID)?;
    require_key(sales, TableKey::Ventas, CUSTOMER_ID)?;
    require_key(products, TableKey::Productos, PRODUCT_ID)?;
    require_key(customers, TableKey::Clientes, CUSTOMER_ID)?;
    if sales.is_empty() {
        return Err(EnrichError::EmptySales);
    }

    let mut report = JoinReport::default();

    let (with_products, stats) = left_join(sales, products, PRODUCT_ID);
    log_join(TableKey::Productos, &stats);
    report.joins.insert(TableKey::Productos, stats);

    let (mut table, stats) = left_join(&with_products, customers, CUSTOMER_ID);
    log_join(TableKey::Clientes, &stats);
    report.joins.insert(TableKey::Clientes, stats);

    if table.has_column(MARGIN) && table.has_column(REVENUE) {
        // Both columns were just checked, the ratio cannot fail.
        if let Ok(with_pct) = with_ratio(&table, MARGIN, REVENUE, MARGIN_RATIO, 1.0) {
            table = with_pct;
        }
    } else {
        debug!("{} or {} missing, {} not derived", MARGIN, REVENUE, MARGIN_RATIO);
    }

    debug!(
        rows = table.row_count(),
        columns = table.columns().len(),
        "enriched sales table built"
    );

    Ok(Enrichment { table, report })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn require_key(table: &Table, key: TableKey, column: &str) -> Result<(), EnrichError> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(EnrichError::MissingColumn {
            table: key,
            column: column.to_string(),
        })
    }
}

fn log_join(reference: TableKey, stats: &JoinStats) {
    if !stats.duplicate_keys.is_empty() {
        warn!(
            table = %reference,
            key = %stats.key,
            duplicates = stats.duplicate_keys.len(),
            "reference table has duplicate keys; first occurrence used"
        );
    }
    if stats.unmatched_rows > 0 {
        debug!(
            table = %reference,
            unmatched = stats.unmatched_rows,
            "sales rows without a reference match"
        );
    }
}

/// Left join `right` onto `left` by the key strings of `key`.
fn left_join(left: &Table, right: &Table, key: &str) -> (Table, JoinStats) {
    let mut stats = JoinStats {
        key: key.to_string(),
        ..JoinStats::default()
    };

    // First row per reference key.
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut seen_twice: BTreeSet<String> = BTreeSet::new();
    if let Some(right_keys) = right.column(key) {
        for (row, value) in right_keys.values.iter().enumerate() {
            let Some(k) = value.key() else { continue };
            if index.contains_key(&k) {
                seen_twice.insert(k);
            } else {
                index.insert(k, row);
            }
        }
    }
    stats.duplicate_keys = seen_twice.into_iter().collect();

    let matches: Vec<Option<usize>> = left
        .column(key)
        .map(|c| {
            c.values
                .iter()
                .map(|v| v.key().and_then(|k| index.get(&k).copied()))
                .collect()
        })
        .unwrap_or_else(|| vec![None; left.row_count()]);
    stats.unmatched_rows = matches.iter().filter(|m| m.is_none()).count();

    let mut columns: Vec<Column> = left.columns().to_vec();
    for ref_col in right.columns() {
        if ref_col.name == key {
            continue;
        }
        let name = free_name(&columns, &ref_col.name);
        if name != ref_col.name {
            stats.renamed.push((ref_col.name.clone(), name.clone()));
        }
        let values = matches
            .iter()
            .map(|m| {
                m.and_then(|row| ref_col.values.get(row).cloned())
                    .unwrap_or(Value::Null)
            })
            .collect();
        columns.push(Column::new(name, values));
    }

    // Every pushed column has `matches.len()` rows, which is the left row count.
    let table = Table::from_columns(columns).unwrap_or_else(|_| left.clone());
    (table, stats)
}

/// `name` if unused, otherwise `name_master`, `name_master_2`, ...
fn free_name(columns: &[Column], name: &str) -> String {
    let taken = |candidate: &str| columns.iter().any(|c| c.name == candidate);
    if !taken(name) {
        return name.to_string();
    }
    let base = format!("{}{}", name, MASTER_SUFFIX);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
