//! Import shipments: spend trend, supplier ranking and lead times.

use andina_core::models::TableKey;
use serde::Serialize;

use super::{require, Insight, ViewOptions, ViewResult};
use crate::aggregator::{
    count_distinct, group_aggregate, group_mean, group_sum, labelled_pairs, mean, rank_pairs,
    sum, with_lead_time, Aggregation, LeadTimeStats,
};
use crate::insights::{performance, trend};
use crate::pipeline::ProcessedData;

const COST: &str = "costo_mercancia_usd";
const SUPPLIER: &str = "proveedor";
const ORDER_DATE: &str = "fecha_orden";
const ARRIVAL_DATE: &str = "fecha_llegada";
const LEAD_TIME: &str = "lead_time_days";
const TOP_SUPPLIERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportsReport {
    pub total_usd: f64,
    pub shipments: usize,
    pub mean_lead_time_days: Option<f64>,
    pub cost_trend: Insight,
    pub supplier_performance: Insight,
    pub top_suppliers_by_value: Vec<(String, f64)>,
    pub top_suppliers_by_shipments: Vec<(String, f64)>,
    pub lead_time: Option<LeadTimeStats>,
    pub slowest_suppliers: Vec<(String, f64)>,
}

pub fn build(data: &ProcessedData, options: &ViewOptions) -> ViewResult<ImportsReport> {
    let imports = require(data, TableKey::Importaciones, &[COST])?;
    let has = |column: &str| data.fields.has(TableKey::Importaciones, column);

    let table = if data
        .fields
        .has_all(TableKey::Importaciones, &[ORDER_DATE, ARRIVAL_DATE])
    {
        with_lead_time(imports, ORDER_DATE, ARRIVAL_DATE, LEAD_TIME)
            .unwrap_or_else(|_| imports.clone())
    } else {
        imports.clone()
    };

    let shipments = if has("importacion_id") {
        count_distinct(&table, "importacion_id")
    } else {
        table.row_count()
    };

    let count_column = if has("importacion_id") {
        "importacion_id"
    } else {
        SUPPLIER
    };
    let top_suppliers_by_shipments = group_aggregate(
        &table,
        &[SUPPLIER],
        &[Aggregation::count(count_column, "envios")],
    )
    .ok()
    .map(|g| labelled_pairs(&g, SUPPLIER, "envios"))
    .map(|pairs| rank_pairs(pairs, TOP_SUPPLIERS))
    .unwrap_or_default();

    Ok(ImportsReport {
        total_usd: sum(&table, COST),
        shipments,
        mean_lead_time_days: mean(&table, LEAD_TIME),
        cost_trend: Insight::from_outcome(trend(&table, ORDER_DATE, COST, options.period)),
        supplier_performance: Insight::performance(
            performance(&table, SUPPLIER, COST),
            "Proveedores",
        ),
        top_suppliers_by_value: group_sum(&table, SUPPLIER, COST)
            .map(|pairs| rank_pairs(pairs, TOP_SUPPLIERS))
            .unwrap_or_default(),
        top_suppliers_by_shipments,
        lead_time: table.column(LEAD_TIME).and_then(LeadTimeStats::from_column),
        slowest_suppliers: group_mean(&table, SUPPLIER, LEAD_TIME)
            .map(|pairs| rank_pairs(pairs, TOP_SUPPLIERS))
            .unwrap_or_default(),
    })
}
