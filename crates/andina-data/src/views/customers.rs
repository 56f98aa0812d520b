//! Customer segmentation, leaderboard and geography.

use andina_core::models::{Table, TableKey};
use andina_core::schema::{CUSTOMER_ID, MARGIN, REVENUE};
use serde::Serialize;

use super::{as_records, require, Insight, ViewOptions, ViewResult};
use crate::aggregator::{
    distinct_values, filter_eq, group_sum, leaderboard, rank_pairs, LeaderboardSpec,
};
use crate::insights::{distribution, Share};
use crate::pipeline::ProcessedData;

const TOP_CUSTOMERS: usize = 20;
const TOP_CITIES: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomersReport {
    pub segment: Option<String>,
    pub segments: Vec<String>,
    pub segment_insight: Insight,
    pub city_insight: Insight,
    pub segment_shares: Vec<Share>,
    #[serde(serialize_with = "as_records")]
    pub leaderboard: Table,
    pub top_cities: Vec<(String, f64)>,
}

pub fn build(data: &ProcessedData, options: &ViewOptions) -> ViewResult<CustomersReport> {
    let fact = require(data, TableKey::VentasEnriched, &[REVENUE, MARGIN])?;
    let fields = &data.fields;

    let segments = distinct_values(fact, "segmento");
    let filtered: Table = match &options.segment {
        Some(segment) if fields.has(TableKey::VentasEnriched, "segmento") => {
            filter_eq(fact, "segmento", segment).unwrap_or_else(|_| fact.clone())
        }
        _ => fact.clone(),
    };

    let segment_shares = distribution(&filtered, "segmento", REVENUE, usize::MAX)
        .map(|c| c.leaders)
        .unwrap_or_default();

    let name = fields
        .first_present(TableKey::VentasEnriched, &["nombre_cliente", CUSTOMER_ID])
        .unwrap_or(CUSTOMER_ID);
    let count = fields
        .has(TableKey::VentasEnriched, "venta_id")
        .then_some(("venta_id", "transacciones"));
    let leaderboard = leaderboard(
        &filtered,
        &LeaderboardSpec {
            keys: &[name],
            revenue: REVENUE,
            margin: MARGIN,
            extra_sums: &[],
            count,
            ratio_name: "profit_margin",
            sort_by: REVENUE,
            top_n: Some(TOP_CUSTOMERS),
        },
    )
    .unwrap_or_default();

    Ok(CustomersReport {
        segment: options.segment.clone(),
        segments,
        segment_insight: Insight::from_outcome(distribution(&filtered, "segmento", REVENUE, 1)),
        city_insight: Insight::from_outcome(distribution(&filtered, "ciudad", REVENUE, 1)),
        segment_shares,
        leaderboard,
        top_cities: group_sum(&filtered, "ciudad", REVENUE)
            .map(|pairs| rank_pairs(pairs, TOP_CITIES))
            .unwrap_or_default(),
    })
}
