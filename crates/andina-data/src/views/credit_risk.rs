//! Receivables exposure: overdue balance, aging buckets and debtor concentration.

use andina_core::coercion::TimestampProcessor;
use andina_core::models::{Column, Table, TableKey, Value};
use andina_core::schema::CUSTOMER_ID;
use andina_core::time_utils::days_between;
use chrono::NaiveDateTime;
use serde::Serialize;

use super::{require, Insight, ViewResult, ViewUnavailable};
use crate::aggregator::{group_sum, max_date, rank_pairs, safe_ratio, sum};
use crate::insights::distribution;
use crate::pipeline::ProcessedData;

const DUE_DATE: &str = "fecha_vencimiento";
const INVOICE_DATE: &str = "fecha_factura";
const AGING: &str = "antiguedad";
const DAYS_PAST_DUE: &str = "dias_vencido";
const TOP_DEBTORS: usize = 10;

/// Aging buckets in display order.
pub const AGING_BUCKETS: [&str; 5] = ["Al día", "1-30", "31-60", "61-90", ">90"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditRiskReport {
    pub reference_date: NaiveDateTime,
    pub balance_column: String,
    pub outstanding: f64,
    pub overdue: f64,
    pub overdue_pct: f64,
    pub aging: Vec<(String, f64)>,
    pub concentration: Insight,
    pub top_debtors: Vec<(String, f64)>,
}

/// Aging bucket for a number of days past due.
pub fn aging_bucket(days_past_due: i64) -> &'static str {
    match days_past_due {
        i64::MIN..=0 => AGING_BUCKETS[0],
        1..=30 => AGING_BUCKETS[1],
        31..=60 => AGING_BUCKETS[2],
        61..=90 => AGING_BUCKETS[3],
        _ => AGING_BUCKETS[4],
    }
}

pub fn build(data: &ProcessedData) -> ViewResult<CreditRiskReport> {
    let balance = data
        .fields
        .first_present(TableKey::Cartera, &["saldo_cop", "valor_factura_cop"])
        .ok_or_else(|| ViewUnavailable::Column {
            table: TableKey::Cartera,
            column: "saldo_cop".to_string(),
        })?;
    let receivables = require(data, TableKey::Cartera, &[balance, DUE_DATE])?;

    let reference_date = max_date(receivables, INVOICE_DATE)
        .or_else(|_| max_date(receivables, DUE_DATE))
        .map_err(|_| ViewUnavailable::Column {
            table: TableKey::Cartera,
            column: INVOICE_DATE.to_string(),
        })?;

    let aged = with_aging(receivables, reference_date).map_err(|_| ViewUnavailable::Column {
        table: TableKey::Cartera,
        column: DUE_DATE.to_string(),
    })?;

    let by_bucket = group_sum(&aged, AGING, balance).unwrap_or_default();
    let outstanding = sum(&aged, balance);
    let overdue: f64 = by_bucket
        .iter()
        .filter(|(bucket, _)| bucket != AGING_BUCKETS[0])
        .map(|(_, v)| v)
        .sum();

    let aging = AGING_BUCKETS
        .iter()
        .map(|bucket| {
            let total = by_bucket
                .iter()
                .find(|(b, _)| b == bucket)
                .map(|(_, v)| *v)
                .unwrap_or(0.0);
            (bucket.to_string(), total)
        })
        .collect();

    Ok(CreditRiskReport {
        reference_date,
        balance_column: balance.to_string(),
        outstanding,
        overdue,
        overdue_pct: safe_ratio(Some(overdue), Some(outstanding)) * 100.0,
        aging,
        concentration: Insight::from_outcome(distribution(&aged, CUSTOMER_ID, balance, 1)),
        top_debtors: group_sum(&aged, CUSTOMER_ID, balance)
            .map(|pairs| rank_pairs(pairs, TOP_DEBTORS))
            .unwrap_or_default(),
    })
}

/// Append days past due at `reference` and the matching aging bucket.
/// Rows without a due date get nulls in both columns.
fn with_aging(table: &Table, reference: NaiveDateTime) -> andina_core::Result<Table> {
    let due = table
        .column(DUE_DATE)
        .ok_or_else(|| andina_core::AndinaError::MissingColumn(DUE_DATE.to_string()))?;

    let days: Vec<Option<i64>> = due
        .values
        .iter()
        .map(|v| TimestampProcessor::parse(v).map(|d| days_between(d, reference)))
        .collect();

    let mut out = table.clone();
    out.set_column(Column::new(
        DAYS_PAST_DUE,
        days.iter().map(|d| d.map(|n| n as f64).into()).collect(),
    ))?;
    out.set_column(Column::new(
        AGING,
        days.iter()
            .map(|d| d.map(|n| Value::from(aging_bucket(n))).unwrap_or(Value::Null))
            .collect(),
    ))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::process;
    use crate::views::fixtures::{nums, table, text};
    use andina_core::models::TableSet;

    fn receivables(balance_column: &str) -> ProcessedData {
        let mut set = TableSet::with_empty_raw();
        set.insert(
            TableKey::Cartera,
            table(vec![
                ("factura_id", text(&["F1", "F2", "F3", "F4"])),
                ("cliente_id", text(&["C1", "C1", "C2", "C3"])),
                (
                    "fecha_factura",
                    text(&["2024-03-31", "2024-02-01", "2024-01-01", "2023-11-01"]),
                ),
                (
                    "fecha_vencimiento",
                    text(&["2024-04-30", "2024-03-02", "2024-01-31", "2023-12-01"]),
                ),
                (balance_column, nums(&[100.0, 200.0, 300.0, 400.0])),
            ]),
        );
        process(set)
    }

    #[test]
    fn test_aging_bucket_boundaries() {
        assert_eq!(aging_bucket(-5), "Al día");
        assert_eq!(aging_bucket(0), "Al día");
        assert_eq!(aging_bucket(1), "1-30");
        assert_eq!(aging_bucket(30), "1-30");
        assert_eq!(aging_bucket(31), "31-60");
        assert_eq!(aging_bucket(90), "61-90");
        assert_eq!(aging_bucket(91), ">90");
    }

    #[test]
    fn test_overdue_and_aging() {
        let report = build(&receivables("saldo_cop")).unwrap();
        assert_eq!(report.reference_date.to_string(), "2024-03-31 00:00:00");
        assert_eq!(report.outstanding, 1000.0);
        assert_eq!(report.overdue, 900.0);
        assert_eq!(report.overdue_pct, 90.0);
        assert_eq!(
            report.aging,
            vec![
                ("Al día".to_string(), 100.0),
                ("1-30".to_string(), 200.0),
                ("31-60".to_string(), 300.0),
                ("61-90".to_string(), 0.0),
                (">90".to_string(), 400.0),
            ]
        );
    }

    #[test]
    fn test_debtors_and_concentration() {
        let report = build(&receivables("saldo_cop")).unwrap();
        assert_eq!(
            report.top_debtors,
            vec![
                ("C3".to_string(), 400.0),
                ("C1".to_string(), 300.0),
                ("C2".to_string(), 300.0)
            ]
        );
        assert_eq!(
            report.concentration.text,
            "Principal: 'C3' concentra el 40.0% del total ($400)."
        );
    }

    #[test]
    fn test_balance_falls_back_to_invoice_value() {
        let report = build(&receivables("valor_factura_cop")).unwrap();
        assert_eq!(report.balance_column, "valor_factura_cop");
        assert_eq!(report.outstanding, 1000.0);
    }

    #[test]
    fn test_unavailable_without_receivables() {
        let data = process(TableSet::with_empty_raw());
        assert!(build(&data).is_err());
    }
}
