//! Series aggregation across all backend categories
//!
//! Used when a client asks for `get_series` without a category filter. Many
//! backends time out or reject the unfiltered listing, so the proxy asks for
//! each category separately and stitches the answers together.

use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::services::metrics::SERIES_CATEGORY_FETCHES;
use crate::services::xtream::{XtreamBackend, XtreamError, XtreamSeries};

/// Upper bound on category fetches in flight at once
pub const MAX_CONCURRENT_CATEGORY_FETCHES: usize = 10;

/// Records merged from every category that answered, plus bookkeeping
#[derive(Debug, Default)]
pub struct AggregationResult {
    pub series: Vec<XtreamSeries>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Fetch the series of every category and merge them
///
/// Fails only when the category list itself cannot be fetched. A category
/// whose fetch fails is skipped and counted in `failed`.
pub async fn collect_all_series(
    backend: Arc<dyn XtreamBackend>,
) -> Result<AggregationResult, XtreamError> {
    let categories = backend.series_categories().await.map_err(|e| {
        error!("Error getting series categories: {}", e);
        e
    })?;

    info!(
        "Aggregating series across {} categories ({} at a time)",
        categories.len(),
        MAX_CONCURRENT_CATEGORY_FETCHES
    );

    let accumulator = Arc::new(Mutex::new(AggregationResult::default()));
    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_CATEGORY_FETCHES));
    let mut tasks = JoinSet::new();

    for category in categories {
        let backend = Arc::clone(&backend);
        let accumulator = Arc::clone(&accumulator);
        let permits = Arc::clone(&permits);

        tasks.spawn(async move {
            let category_id = category.category_id.to_string();

            let fetched = match permits.acquire_owned().await {
                Ok(_permit) => backend.series(&category_id).await,
                Err(e) => Err(XtreamError::Network(e.to_string())),
            };

            let mut acc = accumulator.lock().await;
            match fetched {
                Ok(series) => {
                    debug!(
                        "Added {} series from category {} ({})",
                        series.len(),
                        category_id,
                        category.category_name
                    );
                    acc.succeeded += 1;
                    acc.series.extend(series);
                    SERIES_CATEGORY_FETCHES.with_label_values(&["success"]).inc();
                }
                Err(e) => {
                    warn!(
                        "Error getting series for category {} ({}): {}",
                        category_id, category.category_name, e
                    );
                    acc.failed += 1;
                    SERIES_CATEGORY_FETCHES.with_label_values(&["failure"]).inc();
                }
            }
        });
    }

    // Barrier: every category has either merged or been counted as failed
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Series category task aborted: {}", e);
            accumulator.lock().await.failed += 1;
            SERIES_CATEGORY_FETCHES.with_label_values(&["failure"]).inc();
        }
    }

    let result = match Arc::try_unwrap(accumulator) {
        Ok(mutex) => mutex.into_inner(),
        Err(shared) => std::mem::take(&mut *shared.lock().await),
    };

    info!(
        "Series loading complete: {} categories successful, {} failed, {} total series",
        result.succeeded,
        result.failed,
        result.series.len()
    );

    Ok(result)
}
