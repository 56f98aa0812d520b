//! Per-view report builders.
//!
//! A builder only chooses which tables and columns to feed to the
//! aggregation and insight functions; none of them aggregate on their own.
//! A view whose inputs are absent yields [`ViewUnavailable`].

pub mod credit_risk;
pub mod customers;
pub mod imports;
pub mod inventory;
pub mod overview;
pub mod profitability;

use std::fmt;

use andina_core::models::{Table, TableKey};
use andina_core::settings::ViewName;
use andina_core::time_utils::Period;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::insights::{render, InsightResult, NoData, PerformanceResult};
use crate::pipeline::ProcessedData;

pub use credit_risk::CreditRiskReport;
pub use customers::CustomersReport;
pub use imports::ImportsReport;
pub use inventory::InventoryReport;
pub use overview::OverviewReport;
pub use profitability::ProfitabilityReport;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a view cannot be built from the current data.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "missing", rename_all = "snake_case")]
pub enum ViewUnavailable {
    #[error("Datos no disponibles: tabla {table} vacía o ausente.")]
    Table { table: TableKey },

    #[error("Datos no disponibles: falta la columna '{column}' en {table}.")]
    Column { table: TableKey, column: String },
}

pub type ViewResult<T> = Result<T, ViewUnavailable>;

// ── Options ───────────────────────────────────────────────────────────────────

/// User-selected filters shared by the views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub category: Option<String>,
    pub segment: Option<String>,
    pub period: Period,
}

// ── Insight wrapper ───────────────────────────────────────────────────────────

/// An insight as shown in a report: rendered text plus its structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub text: String,
    pub result: Option<InsightResult>,
    pub no_data: Option<NoData>,
}

impl Insight {
    pub fn from_outcome<T>(outcome: Result<T, NoData>) -> Self
    where
        T: fmt::Display,
        for<'a> InsightResult: From<&'a T>,
    {
        let text = render(&outcome);
        match outcome {
            Ok(result) => Self {
                text,
                result: Some(InsightResult::from(&result)),
                no_data: None,
            },
            Err(reason) => Self {
                text,
                result: None,
                no_data: Some(reason),
            },
        }
    }

    /// A performance insight headed by `label` instead of the default.
    pub fn performance(outcome: Result<PerformanceResult, NoData>, label: &str) -> Self {
        match outcome {
            Ok(result) => Self {
                text: result.headline(label),
                result: Some(InsightResult::from(&result)),
                no_data: None,
            },
            Err(reason) => Self::missing(reason),
        }
    }

    fn missing(reason: NoData) -> Self {
        Self {
            text: reason.to_string(),
            result: None,
            no_data: Some(reason),
        }
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// One built view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewReport {
    Overview(OverviewReport),
    Profitability(ProfitabilityReport),
    Customers(CustomersReport),
    Imports(ImportsReport),
    Inventory(InventoryReport),
    CreditRisk(CreditRiskReport),
}

/// Build every view selected by `view` (`All` expands to the six views).
pub fn build_views(
    view: ViewName,
    data: &ProcessedData,
    options: &ViewOptions,
) -> Vec<(ViewName, ViewResult<ViewReport>)> {
    view.expand()
        .into_iter()
        .map(|name| (name, build_view(name, data, options)))
        .collect()
}

fn build_view(view: ViewName, data: &ProcessedData, options: &ViewOptions) -> ViewResult<ViewReport> {
    match view {
        ViewName::Overview => overview::build(data, options).map(ViewReport::Overview),
        ViewName::Profitability => {
            profitability::build(data, options).map(ViewReport::Profitability)
        }
        ViewName::Customers => customers::build(data, options).map(ViewReport::Customers),
        ViewName::Imports => imports::build(data, options).map(ViewReport::Imports),
        ViewName::Inventory => inventory::build(data).map(ViewReport::Inventory),
        ViewName::CreditRisk => credit_risk::build(data).map(ViewReport::CreditRisk),
        ViewName::All => unreachable!("`expand` never yields `All`"),
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// The non-empty table under `key`, with every column in `columns`.
pub(crate) fn require<'a>(
    data: &'a ProcessedData,
    key: TableKey,
    columns: &[&str],
) -> ViewResult<&'a Table> {
    let table = data.table(key).ok_or(ViewUnavailable::Table { table: key })?;
    if let Some(missing) = columns.iter().find(|c| !data.fields.has(key, c)) {
        return Err(ViewUnavailable::Column {
            table: key,
            column: missing.to_string(),
        });
    }
    Ok(table)
}

/// Serialize a table as JSON records rather than columns.
pub(crate) fn as_records<S: Serializer>(table: &Table, serializer: S) -> Result<S::Ok, S::Error> {
    table.to_json_records().serialize(serializer)
}
