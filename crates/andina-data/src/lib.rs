//! Data layer for the Andina dashboard.
//!
//! Loads the six raw datasets from a local directory, coerces and joins them
//! into the enriched sales fact table, and exposes the insight and ranking
//! functions the per-view report builders are composed from.

pub mod aggregator;
pub mod enrich;
pub mod insights;
pub mod pipeline;
pub mod reader;
pub mod views;

pub use andina_core as core;
pub use pipeline::{process, ProcessedData, ProcessingReport};
pub use reader::{DataSource, DirectorySource};
