//! Core types for the Comercializadora Andina analytics dashboard.
//!
//! Holds the in-memory tabular model, the per-table schemas, type coercion,
//! period handling, number formatting, the error taxonomy and CLI settings.

pub mod coercion;
pub mod error;
pub mod formatting;
pub mod models;
pub mod schema;
pub mod settings;
pub mod time_utils;

pub use error::{AndinaError, Result};
pub use models::{Column, Table, TableKey, TableSet, Value};
