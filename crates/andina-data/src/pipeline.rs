//! Processing pipeline: raw table set in, analysis-ready table set out.
//!
//! Coerces every present table according to its declared schema, builds the
//! enriched sales table when its inputs are available, and records once which
//! fields the views can rely on. Failures are contained per table: a table
//! that cannot be coerced or joined never prevents the others from loading.

use std::collections::BTreeMap;

use andina_core::coercion::{coerce_table, CoercionReport};
use andina_core::models::{Table, TableKey, TableSet};
use andina_core::schema::AvailableFields;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::enrich::{enrich, JoinReport};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the processed tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingReport {
    /// ISO-8601 timestamp when processing finished.
    pub generated_at: String,
    /// Row count per table after processing.
    pub rows: BTreeMap<TableKey, usize>,
    /// Values nulled during coercion, per table.
    pub coercion: BTreeMap<TableKey, CoercionReport>,
    /// Declared fields absent from tables that did load.
    pub missing_fields: BTreeMap<TableKey, Vec<String>>,
    /// Join statistics when the enriched table was built.
    pub enrichment: Option<JoinReport>,
    /// Why the enriched table is absent, when it is.
    pub enrichment_skipped: Option<String>,
    /// Wall-clock seconds spent processing.
    pub transform_time_seconds: f64,
}

/// The unit published by the cache: tables, field descriptor and report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedData {
    pub tables: TableSet,
    pub fields: AvailableFields,
    pub report: ProcessingReport,
}

impl ProcessedData {
    /// The table under `key` when it is present and has rows.
    pub fn table(&self, key: TableKey) -> Option<&Table> {
        self.tables.get(key).filter(|t| !t.is_empty())
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full processing pipeline.
///
/// 1. Coerce date and decimal columns of every present table.
/// 2. Join sales with products and customers into `ventas_enriched`.
/// 3. Describe the available fields.
pub fn process(mut tables: TableSet) -> ProcessedData {
    let start = std::time::Instant::now();
    let mut report = ProcessingReport::default();

    // ── Step 1: Coerce ────────────────────────────────────────────────────────
    let keys: Vec<TableKey> = tables.keys().collect();
    for key in keys {
        if let Some(table) = tables.get_mut(key) {
            let coercion = coerce_table(key, table);
            if coercion.total_nulled() > 0 {
                report.coercion.insert(key, coercion);
            }
        }
    }

    // ── Step 2: Enrich ────────────────────────────────────────────────────────
    // A stale fact table from an earlier run must not survive.
    tables.remove(TableKey::VentasEnriched);
    let outcome = match (
        tables.get(TableKey::Ventas),
        tables.get(TableKey::Productos),
        tables.get(TableKey::Clientes),
    ) {
        (Some(sales), Some(products), Some(customers)) => Some(enrich(sales, products, customers)),
        _ => None,
    };
    match outcome {
        Some(Ok(enrichment)) => {
            report.enrichment = Some(enrichment.report);
            tables.insert(TableKey::VentasEnriched, enrichment.table);
        }
        Some(Err(e)) => {
            warn!("Enrichment skipped: {}", e);
            report.enrichment_skipped = Some(e.to_string());
        }
        None => {
            debug!("sales, products or customers absent; enrichment skipped");
            report.enrichment_skipped = Some("reference tables absent".to_string());
        }
    }

    // ── Step 3: Describe ──────────────────────────────────────────────────────
    let fields = AvailableFields::describe(&tables);
    for key in tables.keys() {
        if !fields.has_table(key) {
            continue;
        }
        let missing = fields.missing_fields(key);
        if !missing.is_empty() {
            debug!(table = %key, missing = ?missing, "declared fields absent");
            report
                .missing_fields
                .insert(key, missing.into_iter().map(String::from).collect());
        }
    }
    report.rows = tables.iter().map(|(k, t)| (k, t.row_count())).collect();
    report.generated_at = Utc::now().to_rfc3339();
    report.transform_time_seconds = start.elapsed().as_secs_f64();

    info!(
        tables = tables.len(),
        enriched = tables.contains(TableKey::VentasEnriched),
        "processing complete"
    );

    ProcessedData {
        tables,
        fields,
        report,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use andina_core::models::{Column, Value};

    fn table(columns: Vec<(&str, Vec<Value>)>) -> Table {
        Table::from_columns(columns.into_iter().map(|(n, v)| Column::new(n, v)).collect()).unwrap()
    }

    fn raw_set() -> TableSet {
        let mut set = TableSet::with_empty_raw();
        set.insert(
            TableKey::Ventas,
            table(vec![
                ("fecha", vec![Value::from("2024-01-05"), Value::from("basura")]),
                ("producto_id", vec![Value::Number(1.0), Value::Number(2.0)]),
                ("cliente_id", vec![Value::Number(7.0), Value::Number(7.0)]),
                ("subtotal_cop", vec![Value::Number(100.0), Value::Number(50.0)]),
                ("margen_total_cop", vec![Value::Number(25.0), Value::Number(5.0)]),
            ]),
        );
        set.insert(
            TableKey::Productos,
            table(vec![
                ("producto_id", vec![Value::Number(1.0), Value::Number(2.0)]),
                ("descripcion", vec![Value::from("Cable"), Value::from("Tubo")]),
            ]),
        );
        set.insert(
            TableKey::Clientes,
            table(vec![
                ("cliente_id", vec![Value::Number(7.0)]),
                ("segmento", vec![Value::from("Mayorista")]),
            ]),
        );
        set.insert(
            TableKey::Importaciones,
            table(vec![
                ("costo_mercancia_usd", vec![Value::from("1234,5"), Value::from("n/a")]),
                ("fecha_orden", vec![Value::from("2024-01-01"), Value::Null]),
            ]),
        );
        set
    }

    #[test]
    fn test_process_builds_enriched_table() {
        let data = process(raw_set());
        let fact = data.table(TableKey::VentasEnriched).unwrap();
        assert_eq!(fact.row_count(), 2);
        assert_eq!(fact.value(1, "segmento"), Some(&Value::from("Mayorista")));
        assert_eq!(fact.value(0, "margen_pct"), Some(&Value::Number(0.25)));
        assert!(data.fields.has(TableKey::VentasEnriched, "descripcion"));
        assert!(data.report.enrichment.is_some());
    }

    #[test]
    fn test_process_coerces_and_reports() {
        let data = process(raw_set());
        let imports = data.table(TableKey::Importaciones).unwrap();
        assert_eq!(imports.value(0, "costo_mercancia_usd"), Some(&Value::Number(1234.5)));
        assert_eq!(imports.value(1, "costo_mercancia_usd"), Some(&Value::Null));
        assert_eq!(
            data.report.coercion[&TableKey::Importaciones].nulled["costo_mercancia_usd"],
            1
        );
        assert_eq!(data.report.coercion[&TableKey::Ventas].nulled["fecha"], 1);
    }

    #[test]
    fn test_process_records_missing_declared_fields() {
        let data = process(raw_set());
        let ventas = &data.report.missing_fields[&TableKey::Ventas];
        assert!(ventas.contains(&"venta_id".to_string()));
        assert!(!ventas.contains(&"fecha".to_string()));
        assert!(data.report.missing_fields[&TableKey::Productos].contains(&"categoria".to_string()));
        // Tables that never loaded are not reported field by field.
        assert!(!data.report.missing_fields.contains_key(&TableKey::Cartera));
    }

    #[test]
    fn test_process_keeps_original_entries() {
        let data = process(raw_set());
        for key in TableKey::RAW {
            assert!(data.tables.contains(key), "{key} missing");
        }
        assert_eq!(data.report.rows[&TableKey::Ventas], 2);
        assert!(data.table(TableKey::Cartera).is_none());
    }

    #[test]
    fn test_process_without_reference_tables_skips_enrichment() {
        let mut set = raw_set();
        set.remove(TableKey::Productos);
        let data = process(set);
        assert!(!data.tables.contains(TableKey::VentasEnriched));
        assert!(data.report.enrichment_skipped.is_some());
    }

    #[test]
    fn test_process_missing_key_column_degrades() {
        let mut set = raw_set();
        // An empty products table has no `producto_id` column.
        set.insert(TableKey::Productos, Table::empty());
        let data = process(set);
        assert!(!data.tables.contains(TableKey::VentasEnriched));
        assert!(data
            .report
            .enrichment_skipped
            .as_deref()
            .unwrap()
            .contains("producto_id"));
        assert!(data.table(TableKey::Ventas).is_some());
    }
}
