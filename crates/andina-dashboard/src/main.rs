mod bootstrap;
mod render;

use std::sync::Arc;
use std::time::Duration;

use andina_core::settings::{OutputFormat, Settings};
use andina_data::views::{build_views, ViewOptions};
use andina_data::{DataSource, DirectorySource, ProcessedData};
use andina_runtime::{DashboardCache, DEFAULT_CACHE_TTL_SECS};
use anyhow::{anyhow, Result};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("Andina dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {:?}, Period: {:?}, Format: {:?}",
        settings.view,
        settings.period,
        settings.format
    );

    let data_dir = settings.resolved_data_dir();
    let mut cache = DashboardCache::new(
        DirectorySource::new(&data_dir),
        Some(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
    );
    let data = snapshot(&mut cache)?;

    if let Some(reason) = &data.report.enrichment_skipped {
        tracing::warn!("Enriched sales table not built: {}", reason);
    }
    for (table, coercion) in &data.report.coercion {
        tracing::info!(
            table = %table,
            nulled = coercion.total_nulled(),
            "unparseable values set to null"
        );
    }

    let options = ViewOptions {
        category: settings.category.clone(),
        segment: settings.segment.clone(),
        period: settings.period,
    };
    let built = build_views(settings.view, &data, &options);

    let output = match settings.format {
        OutputFormat::Text => render::render_text(&built),
        OutputFormat::Json => render::render_json(&built, &data.report)?,
    };
    print!("{}", output);

    Ok(())
}

/// The cached snapshot, loading it first if the cache is cold or stale.
fn snapshot<S: DataSource>(cache: &mut DashboardCache<S>) -> Result<Arc<ProcessedData>> {
    cache.get(false).ok_or_else(|| {
        anyhow!(
            "cannot load data from {}: {}",
            cache.source().describe(),
            cache.last_error().unwrap_or("unknown error")
        )
    })
}
