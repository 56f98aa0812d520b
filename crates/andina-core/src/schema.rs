//! Declared column schemas per dataset and the "available fields" descriptor.
//!
//! Raw tables do not enforce their schema; each dataset declares which columns
//! carry dates, which may arrive with comma decimals, and which fields the
//! views know how to use. After processing, [`AvailableFields`] records once
//! which of those fields are actually present so downstream code does not
//! probe tables ad hoc.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{TableKey, TableSet};

// ── Column names ──────────────────────────────────────────────────────────────

pub const PRODUCT_ID: &str = "producto_id";
pub const CUSTOMER_ID: &str = "cliente_id";
pub const REVENUE: &str = "subtotal_cop";
pub const MARGIN: &str = "margen_total_cop";
pub const MARGIN_RATIO: &str = "margen_pct";
pub const SALE_DATE: &str = "fecha";

/// Suffix given to reference-side columns that collide with a sales column.
pub const MASTER_SUFFIX: &str = "_master";

// ── TableSpec ─────────────────────────────────────────────────────────────────

/// Static description of one dataset.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Columns parsed into timestamps.
    pub date_columns: &'static [&'static str],
    /// Columns that may be serialised with a comma decimal separator.
    pub decimal_columns: &'static [&'static str],
    /// Columns the views read when present.
    pub optional_fields: &'static [&'static str],
}

const VENTAS: TableSpec = TableSpec {
    date_columns: &["fecha"],
    decimal_columns: &[],
    optional_fields: &[
        "venta_id",
        "fecha",
        "cliente_id",
        "producto_id",
        "cantidad",
        "precio_unitario_cop",
        "subtotal_cop",
        "margen_total_cop",
        "categoria",
        "subcategoria",
        "region",
        "ciudad",
        "segmento",
    ],
};

const CLIENTES: TableSpec = TableSpec {
    date_columns: &["fecha_alta"],
    decimal_columns: &[],
    optional_fields: &[
        "cliente_id",
        "nombre_cliente",
        "segmento",
        "region",
        "ciudad",
        "estado",
        "fecha_alta",
    ],
};

const PRODUCTOS: TableSpec = TableSpec {
    date_columns: &[],
    decimal_columns: &[],
    optional_fields: &["producto_id", "descripcion", "categoria", "subcategoria"],
};

const CARTERA: TableSpec = TableSpec {
    date_columns: &["fecha_factura", "fecha_vencimiento"],
    decimal_columns: &[],
    optional_fields: &[
        "factura_id",
        "cliente_id",
        "fecha_factura",
        "fecha_vencimiento",
        "valor_factura_cop",
        "saldo_cop",
    ],
};

const INVENTARIO: TableSpec = TableSpec {
    date_columns: &["fecha_corte"],
    decimal_columns: &[],
    optional_fields: &[
        "fecha_corte",
        "producto_id",
        "centro_logistico",
        "categoria",
        "stock_unidades",
        "valor_inventario_cop",
    ],
};

const IMPORTACIONES: TableSpec = TableSpec {
    date_columns: &["fecha_orden", "fecha_llegada"],
    decimal_columns: &[
        "costo_mercancia_usd",
        "flete_usd",
        "arancel_cop",
        "otros_costos_cop",
    ],
    optional_fields: &[
        "importacion_id",
        "proveedor",
        "fecha_orden",
        "fecha_llegada",
        "costo_mercancia_usd",
        "flete_usd",
        "arancel_cop",
        "otros_costos_cop",
    ],
};

const VENTAS_ENRICHED: TableSpec = TableSpec {
    date_columns: &["fecha"],
    decimal_columns: &[],
    optional_fields: &[
        "venta_id",
        "fecha",
        "cliente_id",
        "producto_id",
        "cantidad",
        "precio_unitario_cop",
        "subtotal_cop",
        "margen_total_cop",
        "margen_pct",
        "categoria",
        "subcategoria",
        "descripcion",
        "region",
        "ciudad",
        "segmento",
        "nombre_cliente",
    ],
};

/// The declared schema of a dataset.
pub fn table_spec(key: TableKey) -> &'static TableSpec {
    match key {
        TableKey::Ventas => &VENTAS,
        TableKey::Clientes => &CLIENTES,
        TableKey::Productos => &PRODUCTOS,
        TableKey::Cartera => &CARTERA,
        TableKey::Inventario => &INVENTARIO,
        TableKey::Importaciones => &IMPORTACIONES,
        TableKey::VentasEnriched => &VENTAS_ENRICHED,
    }
}

// ── AvailableFields ───────────────────────────────────────────────────────────

/// Which tables and columns are present in a processed table set.
///
/// Computed once after processing; every column of a present table is
/// recorded, not only the declared optional fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AvailableFields {
    tables: BTreeMap<TableKey, BTreeSet<String>>,
}

impl AvailableFields {
    /// Describe `set`. Tables with zero rows are recorded as unavailable.
    pub fn describe(set: &TableSet) -> Self {
        let tables = set
            .iter()
            .filter(|(_, table)| !table.is_empty())
            .map(|(key, table)| {
                let cols = table.column_names().into_iter().map(String::from).collect();
                (key, cols)
            })
            .collect();
        Self { tables }
    }

    /// `true` when the table is present with at least one row.
    pub fn has_table(&self, key: TableKey) -> bool {
        self.tables.contains_key(&key)
    }

    pub fn has(&self, key: TableKey, column: &str) -> bool {
        self.tables
            .get(&key)
            .map(|cols| cols.contains(column))
            .unwrap_or(false)
    }

    /// `true` when every column in `columns` is present.
    pub fn has_all(&self, key: TableKey, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.has(key, c))
    }

    /// The first of `candidates` that is present, if any.
    pub fn first_present<'a>(&self, key: TableKey, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.has(key, c))
    }

    /// Declared optional fields of `key` that are absent.
    pub fn missing_fields(&self, key: TableKey) -> Vec<&'static str> {
        table_spec(key)
            .optional_fields
            .iter()
            .copied()
            .filter(|f| !self.has(key, f))
            .collect()
    }
}
