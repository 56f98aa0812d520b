//! Plain-text and JSON rendering of built views.

use std::fmt::Write as _;

use andina_core::formatting::{format_currency, format_number, format_value};
use andina_core::models::Table;
use andina_core::settings::ViewName;
use andina_data::pipeline::ProcessingReport;
use andina_data::views::{
    CreditRiskReport, CustomersReport, ImportsReport, Insight, InventoryReport, OverviewReport,
    ProfitabilityReport, ViewReport, ViewResult,
};
use serde_json::json;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Widest cell before truncation.
const MAX_CELL_WIDTH: usize = 32;

pub type BuiltViews = [(ViewName, ViewResult<ViewReport>)];

// ── Entry points ──────────────────────────────────────────────────────────────

/// Every view as titled text sections.
pub fn render_text(built: &BuiltViews) -> String {
    let mut out = String::new();
    for (name, outcome) in built {
        section(&mut out, name.title());
        match outcome {
            Ok(report) => render_report(&mut out, report),
            Err(unavailable) => {
                let _ = writeln!(out, "{}", unavailable);
            }
        }
        out.push('\n');
    }
    out
}

/// Every view plus the processing report as one pretty-printed JSON document.
pub fn render_json(built: &BuiltViews, report: &ProcessingReport) -> anyhow::Result<String> {
    let views = built
        .iter()
        .map(|(name, outcome)| match outcome {
            Ok(view) => serde_json::to_value(view),
            Err(unavailable) => Ok(json!({
                "view": name,
                "unavailable": unavailable.to_string(),
                "reason": unavailable,
            })),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let document = json!({
        "processing": report,
        "views": views,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

// ── Per-view sections ─────────────────────────────────────────────────────────

fn render_report(out: &mut String, report: &ViewReport) {
    match report {
        ViewReport::Overview(r) => overview(out, r),
        ViewReport::Profitability(r) => profitability(out, r),
        ViewReport::Customers(r) => customers(out, r),
        ViewReport::Imports(r) => imports(out, r),
        ViewReport::Inventory(r) => inventory(out, r),
        ViewReport::CreditRisk(r) => credit_risk(out, r),
    }
}

fn overview(out: &mut String, r: &OverviewReport) {
    kpis(
        out,
        &[
            ("Ventas totales", format_currency(r.total_sales)),
            ("Utilidad", format_currency(r.total_profit)),
            ("Margen bruto", pct(r.gross_margin_pct)),
            ("Clientes activos", r.active_customers.to_string()),
        ],
    );
    insights(out, &[&r.sales_trend, &r.region_insight]);

    let by_period: Vec<(String, f64)> = r
        .sales_by_period
        .iter()
        .map(|p| (p.label.clone(), p.total))
        .collect();
    pairs(out, "Ventas por periodo", "Periodo", &by_period, format_value);
    pairs(out, "Ventas por región", "Región", &r.sales_by_region, format_value);
    pairs(out, "Top productos", "Producto", &r.top_products, format_value);
}

fn profitability(out: &mut String, r: &ProfitabilityReport) {
    if let Some(category) = &r.category {
        let _ = writeln!(out, "Categoría: {}", category);
    }
    kpis(
        out,
        &[
            ("Ventas", format_currency(r.total_sales)),
            ("Margen total", format_currency(r.total_margin)),
            ("Margen %", pct(r.margin_pct)),
        ],
    );
    insights(out, &[&r.performance]);
    pairs(
        out,
        "Margen por subcategoría",
        "Subcategoría",
        &r.margin_by_subcategory,
        format_value,
    );
    let _ = writeln!(out, "Puntos precio/margen: {}", r.price_vs_margin.len());
    records(out, "Rentabilidad por SKU", &r.sku_table);
}

fn customers(out: &mut String, r: &CustomersReport) {
    if let Some(segment) = &r.segment {
        let _ = writeln!(out, "Segmento: {}", segment);
    }
    insights(out, &[&r.segment_insight, &r.city_insight]);

    let shares: Vec<Vec<String>> = r
        .segment_shares
        .iter()
        .map(|s| vec![s.category.clone(), format_value(s.value), pct(s.share_pct)])
        .collect();
    table(
        out,
        "Participación por segmento",
        &["Segmento", "Ventas", "%"],
        &[false, true, true],
        &shares,
    );
    records(out, "Mejores clientes", &r.leaderboard);
    pairs(out, "Ciudades", "Ciudad", &r.top_cities, format_value);
}

fn imports(out: &mut String, r: &ImportsReport) {
    let lead = r
        .mean_lead_time_days
        .map(|d| format!("{} días", format_number(d, 1)))
        .unwrap_or_else(|| "n/d".to_string());
    kpis(
        out,
        &[
            ("Costo mercancía (USD)", format_currency(r.total_usd)),
            ("Envíos", r.shipments.to_string()),
            ("Lead time promedio", lead),
        ],
    );
    insights(out, &[&r.cost_trend, &r.supplier_performance]);
    pairs(
        out,
        "Proveedores por valor",
        "Proveedor",
        &r.top_suppliers_by_value,
        format_value,
    );
    pairs(
        out,
        "Proveedores por envíos",
        "Proveedor",
        &r.top_suppliers_by_shipments,
        |n| format_number(n, 0),
    );
    if let Some(stats) = &r.lead_time {
        let _ = writeln!(
            out,
            "Lead time: n={} media={} mediana={} p90={} min={} max={}",
            stats.count,
            format_number(stats.mean, 1),
            format_number(stats.median, 1),
            format_number(stats.p90, 1),
            format_number(stats.min, 0),
            format_number(stats.max, 0),
        );
    }
    pairs(
        out,
        "Proveedores más lentos",
        "Proveedor",
        &r.slowest_suppliers,
        |d| format_number(d, 1),
    );
}

fn inventory(out: &mut String, r: &InventoryReport) {
    kpis(
        out,
        &[
            ("Fecha de corte", r.snapshot_date.format("%Y-%m-%d").to_string()),
            ("Valor inventario", format_currency(r.total_value)),
            ("Unidades", format_number(r.total_units, 0)),
            ("SKUs", r.distinct_skus.to_string()),
        ],
    );
    if !r.duplicate_keys.is_empty() {
        let _ = writeln!(out, "Claves duplicadas al corte: {}", r.duplicate_keys.join(", "));
    }
    insights(out, &[&r.centre_insight, &r.category_insight]);
    pairs(out, "Valor por centro", "Centro", &r.value_by_centre, format_value);
    pairs(
        out,
        "Unidades por categoría",
        "Categoría",
        &r.units_by_category,
        |n| format_number(n, 0),
    );
    pairs(out, "Histórico de valor", "Corte", &r.value_history, format_value);
}

fn credit_risk(out: &mut String, r: &CreditRiskReport) {
    kpis(
        out,
        &[
            ("Fecha de referencia", r.reference_date.format("%Y-%m-%d").to_string()),
            ("Saldo total", format_currency(r.outstanding)),
            ("Saldo vencido", format_currency(r.overdue)),
            ("Vencido %", pct(r.overdue_pct)),
        ],
    );
    insights(out, &[&r.concentration]);
    pairs(out, "Antigüedad de cartera", "Rango", &r.aging, format_value);
    pairs(out, "Principales deudores", "Cliente", &r.top_debtors, format_value);
}

// ── Building blocks ───────────────────────────────────────────────────────────

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(display_width(title)));
}

fn kpis(out: &mut String, items: &[(&str, String)]) {
    let width = items.iter().map(|(k, _)| display_width(k)).max().unwrap_or(0);
    for (label, value) in items {
        let _ = writeln!(out, "{}  {}", pad_right(label, width), value);
    }
    out.push('\n');
}

fn insights(out: &mut String, items: &[&Insight]) {
    for insight in items {
        let _ = writeln!(out, "• {}", insight);
    }
    out.push('\n');
}

fn pairs(
    out: &mut String,
    title: &str,
    label: &str,
    rows: &[(String, f64)],
    format: impl Fn(f64) -> String,
) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|(k, v)| vec![k.clone(), format(*v)])
        .collect();
    table(out, title, &[label, "Valor"], &[false, true], &rows);
}

fn records(out: &mut String, title: &str, data: &Table) {
    let headers = data.column_names();
    let right: Vec<bool> = data.columns().iter().map(|c| !c.is_textual()).collect();
    let rows: Vec<Vec<String>> = (0..data.row_count())
        .map(|row| {
            data.columns()
                .iter()
                .map(|c| match c.values[row].as_f64() {
                    Some(n) if n.fract() != 0.0 => format_number(n, 2),
                    Some(n) => format_number(n, 0),
                    None => c.values[row].to_string(),
                })
                .collect()
        })
        .collect();
    table(out, title, &headers, &right, &rows);
}

/// Aligned columns; numeric columns are right-aligned.
fn table(out: &mut String, title: &str, headers: &[&str], right: &[bool], rows: &[Vec<String>]) {
    let _ = writeln!(out, "{}", title);
    if rows.is_empty() {
        let _ = writeln!(out, "  (sin datos)\n");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell).min(MAX_CELL_WIDTH));
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = truncate(cell, widths[i]);
                if right.get(i).copied().unwrap_or(false) {
                    pad_left(&cell, widths[i])
                } else {
                    pad_right(&cell, widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let _ = writeln!(out, "  {}", line(&header).trim_end());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "  {}", rule.join("  "));
    for row in rows {
        let _ = writeln!(out, "  {}", line(row).trim_end());
    }
    out.push('\n');
}

fn pct(value: f64) -> String {
    format!("{}%", format_number(value, 1))
}

// ── Text width helpers ────────────────────────────────────────────────────────

/// Terminal columns taken by `s`, counting wide characters as two.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn pad_right(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{}{}", s, " ".repeat(fill))
}

fn pad_left(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{}{}", " ".repeat(fill), s)
}

/// Cut `s` to `width` columns, ending in `…` when shortened.
fn truncate(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    let target = width.saturating_sub(1);
    let mut result = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(1);
        if used + w > target {
            break;
        }
        result.push(c);
        used += w;
    }
    result.push('…');
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
