//! Runtime layer for the Andina dashboard.
//!
//! Owns the processed data between requests: loads it through a data source,
//! keeps the last good snapshot and decides when to reload.

pub mod data_manager;

pub use andina_core as core;
pub use andina_data as data;
pub use data_manager::{DashboardCache, DEFAULT_CACHE_TTL_SECS};
