//! # Cache Bootstrapper
//!
//! Populates a [`LookupCache`] from the durable store once, at startup, before anything
//! else is allowed to see the cache. The caller must not start the consumer or accept
//! read traffic until [`warm`] has returned `Ok`: a partially warmed cache is never
//! exposed as ready.
//!
//! A load failure is fatal. An unreachable store cannot be passed off as an empty one.

use crate::cache::LookupCache;
use crate::error::BootstrapError;
use crate::record::Record;
use crate::store::RecordLoader;
use tracing::{error, info, instrument};

/// Loads every record from `loader` into `cache`. Returns the number of records loaded.
#[instrument(skip_all)]
pub async fn warm<T, L>(loader: &L, cache: &LookupCache<T>) -> Result<usize, BootstrapError>
where
    T: Record,
    L: RecordLoader<T> + ?Sized,
{
    let records = loader.load_all().await.map_err(|e| {
        error!(error = %e, "Failed to load records for cache warm-up");
        BootstrapError::Load(e)
    })?;

    let count = records.len();
    for record in records {
        cache.put(record);
    }

    info!(count, size = cache.len(), "Cache warmed");
    Ok(count)
}
