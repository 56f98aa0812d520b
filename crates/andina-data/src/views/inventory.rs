//! Stock position at the latest cut-off date and its history.

use andina_core::models::TableKey;
use andina_core::schema::PRODUCT_ID;
use chrono::NaiveDateTime;
use serde::Serialize;

use super::{require, Insight, ViewResult, ViewUnavailable};
use crate::aggregator::{count_distinct, group_sum, latest_snapshot, rank_pairs, sum};
use crate::insights::distribution;
use crate::pipeline::ProcessedData;

const CUT_OFF: &str = "fecha_corte";
const VALUE: &str = "valor_inventario_cop";
const UNITS: &str = "stock_unidades";
const CENTRE: &str = "centro_logistico";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryReport {
    pub snapshot_date: NaiveDateTime,
    /// `producto_id|centro_logistico` keys repeated at the snapshot date.
    pub duplicate_keys: Vec<String>,
    pub total_value: f64,
    pub total_units: f64,
    pub distinct_skus: usize,
    pub centre_insight: Insight,
    pub category_insight: Insight,
    pub value_by_centre: Vec<(String, f64)>,
    pub units_by_category: Vec<(String, f64)>,
    pub value_history: Vec<(String, f64)>,
}

pub fn build(data: &ProcessedData) -> ViewResult<InventoryReport> {
    let inventory = require(data, TableKey::Inventario, &[CUT_OFF, VALUE])?;

    let unique_by: Vec<&str> = [PRODUCT_ID, CENTRE]
        .into_iter()
        .filter(|&c| data.fields.has(TableKey::Inventario, c))
        .collect();
    let snapshot =
        latest_snapshot(inventory, CUT_OFF, &unique_by).map_err(|_| ViewUnavailable::Column {
            table: TableKey::Inventario,
            column: CUT_OFF.to_string(),
        })?;
    let latest = &snapshot.table;

    Ok(InventoryReport {
        snapshot_date: snapshot.date,
        total_value: sum(latest, VALUE),
        total_units: sum(latest, UNITS),
        distinct_skus: count_distinct(latest, PRODUCT_ID),
        centre_insight: Insight::from_outcome(distribution(latest, CENTRE, VALUE, 1)),
        category_insight: Insight::from_outcome(distribution(latest, "categoria", VALUE, 1)),
        value_by_centre: group_sum(latest, CENTRE, VALUE)
            .map(|pairs| rank_pairs(pairs, usize::MAX))
            .unwrap_or_default(),
        units_by_category: group_sum(latest, "categoria", UNITS)
            .map(|pairs| rank_pairs(pairs, usize::MAX))
            .unwrap_or_default(),
        // Chronological: timestamps group in ascending order.
        value_history: group_sum(inventory, CUT_OFF, VALUE).unwrap_or_default(),
        duplicate_keys: snapshot.duplicate_keys,
    })
}
