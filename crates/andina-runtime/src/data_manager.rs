//! Last-good cache of the processed dashboard data.
//!
//! [`DashboardCache`] owns a [`DataSource`] and publishes each successful
//! load-and-process run as one `Arc<ProcessedData>`. A failed refresh leaves
//! the previous snapshot in place and records the error; readers holding an
//! `Arc` are never affected by a refresh.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use andina_core::error::Result;
use andina_data::{process, DataSource, ProcessedData};
use tracing::{debug, info, warn};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default time-to-live of a snapshot, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Load attempts per refresh before giving up and keeping the old snapshot.
const MAX_RETRY_ATTEMPTS: u32 = 3;

// ── DashboardCache ────────────────────────────────────────────────────────────

/// TTL-bounded cache over a data source.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use andina_data::DirectorySource;
/// use andina_runtime::data_manager::DashboardCache;
///
/// let mut cache = DashboardCache::new(
///     DirectorySource::new("/srv/andina"),
///     Some(Duration::from_secs(600)),
/// );
/// if let Some(data) = cache.get(false) {
///     println!("{} tables", data.tables.len());
/// }
/// ```
pub struct DashboardCache<S: DataSource> {
    source: S,
    /// `None` keeps a snapshot until it is invalidated or force-refreshed.
    ttl: Option<Duration>,
    snapshot: Option<Arc<ProcessedData>>,
    loaded_at: Option<Instant>,
    last_error: Option<String>,
}

impl<S: DataSource> DashboardCache<S> {
    pub fn new(source: S, ttl: Option<Duration>) -> Self {
        Self {
            source,
            ttl,
            snapshot: None,
            loaded_at: None,
            last_error: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Current snapshot, reloading first when it is missing, expired or
    /// `force_refresh` is set.
    ///
    /// On a failed reload the previous snapshot (if any) is returned.
    pub fn get(&mut self, force_refresh: bool) -> Option<Arc<ProcessedData>> {
        if !force_refresh && self.is_fresh() {
            debug!("returning cached snapshot");
            return self.snapshot.clone();
        }
        // Failure is already recorded in `last_error`.
        let _ = self.refresh();
        self.snapshot.clone()
    }

    /// Load and process the source now, replacing the snapshot on success.
    pub fn refresh(&mut self) -> Result<Arc<ProcessedData>> {
        match self.load_with_retry() {
            Ok(data) => {
                info!(
                    source = %self.source.describe(),
                    tables = data.tables.len(),
                    seconds = data.report.transform_time_seconds,
                    "snapshot refreshed"
                );
                let data = Arc::new(data);
                self.snapshot = Some(Arc::clone(&data));
                self.loaded_at = Some(Instant::now());
                self.last_error = None;
                Ok(data)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed; keeping previous snapshot");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drop the snapshot so the next [`get`](Self::get) reloads.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.loaded_at = None;
        debug!("cache invalidated");
    }

    /// Age of the current snapshot, or `None` before the first successful load.
    pub fn age(&self) -> Option<Duration> {
        self.loaded_at.map(|ts| ts.elapsed())
    }

    /// Message of the last failed refresh, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_fresh(&self) -> bool {
        match (&self.snapshot, self.loaded_at, self.ttl) {
            (Some(_), Some(ts), Some(ttl)) => ts.elapsed() < ttl,
            (Some(_), Some(_), None) => true,
            _ => false,
        }
    }

    /// Back-off between attempts: 0 ms, 100 ms, 200 ms.
    fn load_with_retry(&self) -> Result<ProcessedData> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let sleep_ms = u64::from(attempt) * 100;
                debug!(attempt, sleep_ms, "retrying load after back-off");
                thread::sleep(Duration::from_millis(sleep_ms));
            }
            match self.source.load() {
                Ok(tables) => return Ok(process(tables)),
                Err(e) if attempt + 1 < MAX_RETRY_ATTEMPTS => {
                    warn!(attempt, error = %e, "load attempt failed");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use andina_core::error::AndinaError;
    use andina_core::models::{Column, Table, TableKey, TableSet, Value};
    use std::cell::Cell;
    use std::path::PathBuf;

    /// Source whose failure can be switched on and which counts loads.
    struct StubSource {
        fail: Cell<bool>,
        loads: Cell<usize>,
        rows: Cell<usize>,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                fail: Cell::new(false),
                loads: Cell::new(0),
                rows: Cell::new(1),
            }
        }
    }

    impl DataSource for StubSource {
        fn load(&self) -> Result<TableSet> {
            self.loads.set(self.loads.get() + 1);
            if self.fail.get() {
                return Err(AndinaError::DataPathNotFound(PathBuf::from("/sin/datos")));
            }
            let mut set = TableSet::with_empty_raw();
            let values = vec![Value::Number(100.0); self.rows.get()];
            set.insert(
                TableKey::Ventas,
                Table::from_columns(vec![Column::new("subtotal_cop", values)]).unwrap(),
            );
            Ok(set)
        }

        fn describe(&self) -> String {
            "stub".to_string()
        }
    }

    fn sales_rows(data: &ProcessedData) -> usize {
        data.tables.get(TableKey::Ventas).map(|t| t.row_count()).unwrap_or(0)
    }

    // ── Caching ──────────────────────────────────────────────────────────

    #[test]
    fn test_first_get_loads() {
        let mut cache = DashboardCache::new(StubSource::new(), None);
        assert!(cache.age().is_none());

        let data = cache.get(false).unwrap();
        assert_eq!(sales_rows(&data), 1);
        assert_eq!(cache.source().loads.get(), 1);
        assert!(cache.age().unwrap() < Duration::from_secs(5));
        assert!(cache.last_error().is_none());
    }

    #[test]
    fn test_fresh_snapshot_is_reused() {
        let mut cache = DashboardCache::new(StubSource::new(), Some(Duration::from_secs(60)));
        let first = cache.get(false).unwrap();
        let second = cache.get(false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.source().loads.get(), 1);
    }

    #[test]
    fn test_expired_snapshot_reloads() {
        let mut cache = DashboardCache::new(StubSource::new(), Some(Duration::ZERO));
        cache.get(false);
        cache.get(false);
        assert_eq!(cache.source().loads.get(), 2);
    }

    #[test]
    fn test_force_refresh_bypasses_ttl() {
        let mut cache = DashboardCache::new(StubSource::new(), None);
        let first = cache.get(false).unwrap();
        cache.source().rows.set(3);
        let second = cache.get(true).unwrap();
        assert_eq!(sales_rows(&first), 1);
        assert_eq!(sales_rows(&second), 3);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let mut cache = DashboardCache::new(StubSource::new(), None);
        cache.get(false);
        cache.invalidate();
        assert!(cache.age().is_none());
        cache.get(false);
        assert_eq!(cache.source().loads.get(), 2);
    }

    // ── Failure handling ─────────────────────────────────────────────────

    #[test]
    fn test_failed_refresh_keeps_last_good_snapshot() {
        let mut cache = DashboardCache::new(StubSource::new(), None);
        let good = cache.get(false).unwrap();

        cache.source().fail.set(true);
        assert!(cache.refresh().is_err());
        assert_eq!(cache.source().loads.get(), 1 + MAX_RETRY_ATTEMPTS as usize);

        let after = cache.get(false).unwrap();
        assert!(Arc::ptr_eq(&good, &after));
        assert!(cache.last_error().unwrap().contains("/sin/datos"));
    }

    #[test]
    fn test_success_clears_last_error() {
        let mut cache = DashboardCache::new(StubSource::new(), None);
        cache.source().fail.set(true);
        assert!(cache.get(false).is_none());
        assert!(cache.last_error().is_some());

        cache.source().fail.set(false);
        assert!(cache.get(true).is_some());
        assert!(cache.last_error().is_none());
    }
}
