//! Margin analysis by subcategory and SKU, optionally within one category.

use andina_core::models::{Table, TableKey};
use andina_core::schema::{MARGIN, PRODUCT_ID, REVENUE};
use serde::Serialize;

use super::{as_records, require, Insight, ViewOptions, ViewResult};
use crate::aggregator::{
    distinct_values, filter_eq, group_sum, leaderboard, rank_pairs, safe_ratio, sum, with_ratio,
    LeaderboardSpec,
};
use crate::insights::performance;
use crate::pipeline::ProcessedData;

/// Upper bound on scatter points handed to a chart.
const MAX_SCATTER_POINTS: usize = 5_000;

/// One sale as a (unit price, unit margin) point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub unit_price: f64,
    pub unit_margin: f64,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityReport {
    pub category: Option<String>,
    pub categories: Vec<String>,
    pub total_sales: f64,
    pub total_margin: f64,
    pub margin_pct: f64,
    pub performance: Insight,
    pub margin_by_subcategory: Vec<(String, f64)>,
    pub price_vs_margin: Vec<PricePoint>,
    #[serde(serialize_with = "as_records")]
    pub sku_table: Table,
}

pub fn build(data: &ProcessedData, options: &ViewOptions) -> ViewResult<ProfitabilityReport> {
    let fact = require(data, TableKey::VentasEnriched, &[REVENUE, MARGIN])?;
    let has = |column: &str| data.fields.has(TableKey::VentasEnriched, column);

    let categories = distinct_values(fact, "categoria");
    let filtered: Table = match &options.category {
        Some(category) if has("categoria") => {
            filter_eq(fact, "categoria", category).unwrap_or_else(|_| fact.clone())
        }
        _ => fact.clone(),
    };

    let total_sales = sum(&filtered, REVENUE);
    let total_margin = sum(&filtered, MARGIN);

    let margin_by_subcategory = group_sum(&filtered, "subcategoria", MARGIN)
        .map(|pairs| rank_pairs(pairs, usize::MAX))
        .unwrap_or_default();

    let price_vs_margin = if has("precio_unitario_cop") && has("cantidad") {
        price_points(&filtered)
    } else {
        Vec::new()
    };

    let keys: Vec<&str> = [PRODUCT_ID, "descripcion", "categoria"]
        .into_iter()
        .filter(|&c| has(c))
        .collect();
    let extra: Vec<&str> = ["cantidad"].into_iter().filter(|&c| has(c)).collect();
    let sku_table = leaderboard(
        &filtered,
        &LeaderboardSpec {
            keys: &keys,
            revenue: REVENUE,
            margin: MARGIN,
            extra_sums: &extra,
            count: None,
            ratio_name: "margin_pct",
            sort_by: MARGIN,
            top_n: None,
        },
    )
    .unwrap_or_default();

    Ok(ProfitabilityReport {
        category: options.category.clone(),
        categories,
        total_sales,
        total_margin,
        margin_pct: safe_ratio(Some(total_margin), Some(total_sales)) * 100.0,
        performance: Insight::performance(
            performance(&filtered, "subcategoria", MARGIN),
            "Rentabilidad",
        ),
        margin_by_subcategory,
        price_vs_margin,
        sku_table,
    })
}

fn price_points(table: &Table) -> Vec<PricePoint> {
    let Ok(with_unit) = with_ratio(table, MARGIN, "cantidad", "unit_margin", 1.0) else {
        return Vec::new();
    };
    (0..with_unit.row_count())
        .filter_map(|row| {
            let quantity = with_unit.value(row, "cantidad")?.as_f64()?;
            if quantity == 0.0 {
                return None;
            }
            Some(PricePoint {
                unit_price: with_unit.value(row, "precio_unitario_cop")?.as_f64()?,
                unit_margin: with_unit.value(row, "unit_margin")?.as_f64()?,
                category: with_unit.value(row, "categoria").and_then(|v| v.key()),
            })
        })
        .take(MAX_SCATTER_POINTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::fixtures::sales_data;
    use andina_core::models::Value;

    #[test]
    fn test_unfiltered_report() {
        let report = build(&sales_data(), &ViewOptions::default()).unwrap();
        assert_eq!(report.categories, vec!["Eléctrico", "Plomería"]);
        assert_eq!(report.total_margin, 130.0);
        assert_eq!(
            report.performance.text,
            "Rentabilidad: Líder: 'Cables' | Menor: 'Tubos'."
        );
        assert_eq!(report.margin_by_subcategory[0], ("Cables".to_string(), 80.0));
    }

    #[test]
    fn test_category_filter() {
        let options = ViewOptions {
            category: Some("Plomería".to_string()),
            ..ViewOptions::default()
        };
        let report = build(&sales_data(), &options).unwrap();
        assert_eq!(report.total_sales, 300.0);
        assert_eq!(report.total_margin, 50.0);
        assert_eq!(report.sku_table.row_count(), 1);
        assert_eq!(report.margin_by_subcategory, vec![("Tubos".to_string(), 50.0)]);
    }

    #[test]
    fn test_sku_table_sorted_by_margin_with_pct() {
        let report = build(&sales_data(), &ViewOptions::default()).unwrap();
        let skus = &report.sku_table;
        assert_eq!(skus.value(0, "producto_id"), Some(&Value::from("P1")));
        assert_eq!(skus.value(0, "cantidad"), Some(&Value::Number(4.0)));
        assert_eq!(skus.value(0, "margin_pct"), Some(&Value::Number(20.0)));
    }

    #[test]
    fn test_price_points_use_unit_margin() {
        let report = build(&sales_data(), &ViewOptions::default()).unwrap();
        assert_eq!(report.price_vs_margin.len(), 4);
        assert_eq!(report.price_vs_margin[1].unit_margin, 5.0);
        assert_eq!(report.price_vs_margin[1].category.as_deref(), Some("Plomería"));
    }
}
