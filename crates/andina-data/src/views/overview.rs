//! Executive summary: headline KPIs, sales trend and top products.

use andina_core::models::TableKey;
use andina_core::schema::{CUSTOMER_ID, MARGIN, REVENUE, SALE_DATE};
use serde::Serialize;

use super::{require, Insight, ViewOptions, ViewResult};
use crate::aggregator::{count_distinct, count_where_eq, group_sum, rank_pairs, sum};
use crate::insights::{distribution, period_totals, trend, PeriodTotal};
use crate::pipeline::ProcessedData;

const TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewReport {
    pub total_sales: f64,
    pub total_profit: f64,
    pub gross_margin_pct: f64,
    pub active_customers: usize,
    pub sales_trend: Insight,
    pub region_insight: Insight,
    pub sales_by_period: Vec<PeriodTotal>,
    pub sales_by_region: Vec<(String, f64)>,
    pub top_products: Vec<(String, f64)>,
}

pub fn build(data: &ProcessedData, options: &ViewOptions) -> ViewResult<OverviewReport> {
    let sales = require(data, TableKey::VentasEnriched, &[REVENUE])?;

    let total_sales = sum(sales, REVENUE);
    let total_profit = sum(sales, MARGIN);
    let gross_margin_pct = if total_sales > 0.0 {
        total_profit / total_sales * 100.0
    } else {
        0.0
    };

    let active_customers = match data.table(TableKey::Clientes) {
        Some(customers) if data.fields.has(TableKey::Clientes, "estado") => {
            count_where_eq(customers, "estado", "Activo").unwrap_or(0)
        }
        _ => count_distinct(sales, CUSTOMER_ID),
    };

    let product_label = data
        .fields
        .first_present(TableKey::VentasEnriched, &["descripcion", "producto_id"]);
    let top_products = product_label
        .and_then(|label| group_sum(sales, label, REVENUE).ok())
        .map(|pairs| rank_pairs(pairs, TOP_PRODUCTS))
        .unwrap_or_default();

    Ok(OverviewReport {
        total_sales,
        total_profit,
        gross_margin_pct,
        active_customers,
        sales_trend: Insight::from_outcome(trend(sales, SALE_DATE, REVENUE, options.period)),
        region_insight: Insight::from_outcome(distribution(sales, "region", REVENUE, 1)),
        sales_by_period: period_totals(sales, SALE_DATE, REVENUE, options.period)
            .unwrap_or_default(),
        sales_by_region: group_sum(sales, "region", REVENUE)
            .map(|pairs| rank_pairs(pairs, usize::MAX))
            .unwrap_or_default(),
        top_products,
    })
}
