//! Descriptive insights over any (table, dimension, measure) triple.
//!
//! Every analysis returns a typed result or a [`NoData`] reason; the text shown
//! on the dashboard is a rendering of [`InsightResult`], never the other way
//! around.

use std::collections::BTreeMap;
use std::fmt;

use andina_core::coercion::TimestampProcessor;
use andina_core::error::AndinaError;
use andina_core::formatting::{format_signed_pct, format_value};
use andina_core::models::Table;
use andina_core::time_utils::Period;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::aggregator::{group_sum, require};

// ── NoData ────────────────────────────────────────────────────────────────────

/// Why an analysis produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum NoData {
    #[error("No hay datos.")]
    EmptyInput,

    #[error("Falta la columna '{0}'.")]
    MissingColumn(String),

    #[error("Se necesitan al menos dos periodos para calcular una tendencia (hay {found}).")]
    InsufficientPeriods { found: usize },

    #[error("Total es 0.")]
    ZeroTotal,
}

impl From<AndinaError> for NoData {
    fn from(err: AndinaError) -> Self {
        match err {
            AndinaError::MissingColumn(column) => NoData::MissingColumn(column),
            _ => NoData::EmptyInput,
        }
    }
}

// ── Trend ─────────────────────────────────────────────────────────────────────

/// Total of a measure within one period bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotal {
    pub start: NaiveDate,
    pub label: String,
    pub total: f64,
}

/// Relative change between the last two periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TrendChange {
    Percent(f64),
    /// The previous period summed to zero.
    Undefined,
}

impl TrendChange {
    pub fn percent(&self) -> Option<f64> {
        match self {
            TrendChange::Percent(p) => Some(*p),
            TrendChange::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub period: Period,
    pub previous: PeriodTotal,
    pub last: PeriodTotal,
    pub change: TrendChange,
}

/// Sum `value_col` per `period` bucket of `date_col`, in chronological order.
///
/// Rows whose date cannot be parsed are dropped; null or non-numeric values
/// count as zero.
pub fn period_totals(
    table: &Table,
    date_col: &str,
    value_col: &str,
    period: Period,
) -> Result<Vec<PeriodTotal>, NoData> {
    if table.is_empty() {
        return Err(NoData::EmptyInput);
    }
    let dates = require(table, date_col)?;
    let values = require(table, value_col)?;

    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in dates.values.iter().zip(values.values.iter()) {
        let Some(ts) = TimestampProcessor::parse(date) else {
            continue;
        };
        *buckets.entry(period.truncate(ts)).or_default() += value.as_f64().unwrap_or(0.0);
    }

    Ok(buckets
        .into_iter()
        .map(|(start, total)| PeriodTotal {
            start,
            label: period.label(start),
            total,
        })
        .collect())
}

/// Compare the last two period totals of `value_col`.
pub fn trend(
    table: &Table,
    date_col: &str,
    value_col: &str,
    period: Period,
) -> Result<TrendResult, NoData> {
    let mut totals = period_totals(table, date_col, value_col, period)?;
    if totals.len() < 2 {
        return Err(NoData::InsufficientPeriods {
            found: totals.len(),
        });
    }

    let last = totals.pop().ok_or(NoData::EmptyInput)?;
    let previous = totals.pop().ok_or(NoData::EmptyInput)?;
    let change = if previous.total == 0.0 {
        TrendChange::Undefined
    } else {
        TrendChange::Percent((last.total - previous.total) / previous.total * 100.0)
    };

    Ok(TrendResult {
        period,
        previous,
        last,
        change,
    })
}

// ── Distribution ──────────────────────────────────────────────────────────────

/// One category's part of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub category: String,
    pub value: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcentrationResult {
    pub top_category: String,
    pub top_value: f64,
    pub total: f64,
    pub share_pct: f64,
    /// The largest categories, at most `top_n` of them.
    pub leaders: Vec<Share>,
}

/// Share of the total held by the largest categories of `category_col`.
///
/// Ties go to the category that sorts first.
pub fn distribution(
    table: &Table,
    category_col: &str,
    value_col: &str,
    top_n: usize,
) -> Result<ConcentrationResult, NoData> {
    if table.is_empty() {
        return Err(NoData::EmptyInput);
    }
    let groups = group_sum(table, category_col, value_col)?;
    if groups.is_empty() {
        return Err(NoData::EmptyInput);
    }
    let total: f64 = groups.iter().map(|(_, v)| v).sum();
    if total == 0.0 {
        return Err(NoData::ZeroTotal);
    }

    let mut ranked = groups;
    // Stable: equal sums keep ascending category order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let leaders: Vec<Share> = ranked
        .into_iter()
        .take(top_n.max(1))
        .map(|(category, value)| Share {
            share_pct: value / total * 100.0,
            category,
            value,
        })
        .collect();

    let top = &leaders[0];
    Ok(ConcentrationResult {
        top_category: top.category.clone(),
        top_value: top.value,
        total,
        share_pct: top.share_pct,
        leaders,
    })
}

// ── Performance ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceResult {
    pub top_entity: String,
    pub top_value: f64,
    pub bottom_entity: String,
    pub bottom_value: f64,
}

/// Best and worst entity by summed `value_col`.
///
/// On ties both ends resolve to the entity that sorts first.
pub fn performance(
    table: &Table,
    entity_col: &str,
    value_col: &str,
) -> Result<PerformanceResult, NoData> {
    if table.is_empty() {
        return Err(NoData::EmptyInput);
    }
    let groups = group_sum(table, entity_col, value_col)?;
    let mut iter = groups.into_iter();
    let first = iter.next().ok_or(NoData::EmptyInput)?;

    let (mut top, mut bottom) = (first.clone(), first);
    for (entity, value) in iter {
        if value > top.1 {
            top = (entity.clone(), value);
        }
        if value < bottom.1 {
            bottom = (entity, value);
        }
    }

    Ok(PerformanceResult {
        top_entity: top.0,
        top_value: top.1,
        bottom_entity: bottom.0,
        bottom_value: bottom.1,
    })
}

impl PerformanceResult {
    /// Headline with a caller-chosen label, e.g. `Margen: Líder: 'X' | Menor: 'Y'.`
    pub fn headline(&self, label: &str) -> String {
        format!(
            "{}: Líder: '{}' | Menor: '{}'.",
            label, self.top_entity, self.bottom_entity
        )
    }
}

// ── InsightResult ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadlineKind {
    Trend,
    Concentration,
    Performance,
}

/// Structured form of every insight shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightResult {
    pub headline_kind: HeadlineKind,
    pub primary_entity: Option<String>,
    pub primary_value: Option<f64>,
    pub secondary_entity: Option<String>,
    pub secondary_value: Option<f64>,
    pub percentage: Option<f64>,
}

impl From<&TrendResult> for InsightResult {
    fn from(t: &TrendResult) -> Self {
        Self {
            headline_kind: HeadlineKind::Trend,
            primary_entity: Some(t.last.label.clone()),
            primary_value: Some(t.last.total),
            secondary_entity: Some(t.previous.label.clone()),
            secondary_value: Some(t.previous.total),
            percentage: t.change.percent(),
        }
    }
}

impl From<&ConcentrationResult> for InsightResult {
    fn from(c: &ConcentrationResult) -> Self {
        Self {
            headline_kind: HeadlineKind::Concentration,
            primary_entity: Some(c.top_category.clone()),
            primary_value: Some(c.top_value),
            secondary_entity: None,
            secondary_value: Some(c.total),
            percentage: Some(c.share_pct),
        }
    }
}

impl From<&PerformanceResult> for InsightResult {
    fn from(p: &PerformanceResult) -> Self {
        Self {
            headline_kind: HeadlineKind::Performance,
            primary_entity: Some(p.top_entity.clone()),
            primary_value: Some(p.top_value),
            secondary_entity: Some(p.bottom_entity.clone()),
            secondary_value: Some(p.bottom_value),
            percentage: None,
        }
    }
}

impl fmt::Display for InsightResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let primary = self.primary_entity.as_deref().unwrap_or_default();
        let primary_value = self.primary_value.unwrap_or(0.0);
        match self.headline_kind {
            HeadlineKind::Trend => match self.percentage {
                Some(pct) => write!(
                    f,
                    "Tendencia: {} vs periodo anterior ({} vs {}).",
                    format_signed_pct(pct),
                    format_value(primary_value),
                    format_value(self.secondary_value.unwrap_or(0.0))
                ),
                None => f.write_str(
                    "El valor anterior fue 0, no se puede calcular el cambio porcentual.",
                ),
            },
            HeadlineKind::Concentration => write!(
                f,
                "Principal: '{}' concentra el {:.1}% del total ({}).",
                primary,
                self.percentage.unwrap_or(0.0),
                format_value(primary_value)
            ),
            HeadlineKind::Performance => write!(
                f,
                "Rentabilidad: Líder: '{}' | Menor: '{}'.",
                primary,
                self.secondary_entity.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl fmt::Display for TrendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        InsightResult::from(self).fmt(f)
    }
}

impl fmt::Display for ConcentrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        InsightResult::from(self).fmt(f)
    }
}

impl fmt::Display for PerformanceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        InsightResult::from(self).fmt(f)
    }
}

/// Render any insight outcome, falling back to the `NoData` message.
pub fn render<T: fmt::Display>(outcome: &Result<T, NoData>) -> String {
    match outcome {
        Ok(result) => result.to_string(),
        Err(reason) => reason.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
