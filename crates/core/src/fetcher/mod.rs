//! Signal fetcher - resolves demand and marketplace signals per release.
//!
//! Each signal is resolved independently:
//! 1. a fresh cache entry is used as-is
//! 2. otherwise the service is called (paced, with retry) and the result is
//!    written through to the cache
//! 3. if the call fails, the last cached value is used even when stale
//! 4. with nothing cached the signal is unavailable
//!
//! A failed call never touches the cache.

mod types;

pub use types::*;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{Namespace, SignalCache};
use crate::collection::CatalogItem;
use crate::discogs::{MarketplaceService, ServiceError};
use crate::pacing::{call_with_retry, RequestPacer, RetryPolicy};

/// Progress is logged every this many releases.
const PROGRESS_EVERY: usize = 25;

/// Resolves signal bundles through cache, service and pacer.
pub struct SignalFetcher {
    service: Arc<dyn MarketplaceService>,
    cache: SignalCache,
    pacer: Arc<RequestPacer>,
    retry: RetryPolicy,
}

impl SignalFetcher {
    pub fn new(
        service: Arc<dyn MarketplaceService>,
        cache: SignalCache,
        pacer: Arc<RequestPacer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            cache,
            pacer,
            retry,
        }
    }

    pub fn cache(&self) -> &SignalCache {
        &self.cache
    }

    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Resolve both signals for one release.
    pub async fn resolve(&self, release_id: u64) -> SignalBundle {
        let service = self.service.as_ref();

        let demand = self
            .resolve_signal(Namespace::Release, release_id, || service.demand(release_id))
            .await;
        // without demand the item is unknown whatever the listings say
        let marketplace = if demand.is_unavailable() {
            debug!(release_id, "Release signal unavailable, skipping marketplace fetch");
            self.cached_only(Namespace::Marketplace, release_id, &demand)
        } else {
            self.resolve_signal(Namespace::Marketplace, release_id, || {
                service.marketplace(release_id)
            })
            .await
        };

        SignalBundle {
            release_id,
            demand,
            marketplace,
        }
    }

    /// Resolve every unique release in `items` with at most `workers` in flight.
    ///
    /// All workers share the pacer, so the aggregate request rate stays under
    /// the limit regardless of `workers`.
    pub async fn resolve_all(
        &self,
        items: &[CatalogItem],
        workers: usize,
    ) -> HashMap<u64, SignalBundle> {
        let mut seen = HashSet::new();
        let ids: Vec<u64> = items
            .iter()
            .map(|item| item.release_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let total = ids.len();
        let done = AtomicUsize::new(0);
        info!(
            releases = total,
            items = items.len(),
            workers,
            "Resolving marketplace signals"
        );

        let bundles: Vec<SignalBundle> = stream::iter(ids)
            .map(|release_id| {
                let done = &done;
                async move {
                    let bundle = self.resolve(release_id).await;
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % PROGRESS_EVERY == 0 || n == total {
                        info!("Resolved {}/{} releases", n, total);
                    }
                    bundle
                }
            })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

        bundles
            .into_iter()
            .map(|bundle| (bundle.release_id, bundle))
            .collect()
    }

    /// Resolve a signal from the cache alone, carrying `cause`'s failure.
    fn cached_only<T, C>(
        &self,
        namespace: Namespace,
        release_id: u64,
        cause: &Resolved<C>,
    ) -> Resolved<T>
    where
        T: DeserializeOwned,
    {
        let error = format!(
            "skipped: {}",
            cause.error().unwrap_or("release signal unavailable")
        );
        let throttled = cause.is_throttled();
        match self.cache.get_as::<T>(namespace, &release_id.to_string()) {
            Some(hit) if hit.fresh => Resolved::Cache(hit.value),
            Some(stale) => Resolved::Stale {
                value: stale.value,
                error,
                throttled,
            },
            None => Resolved::Unavailable { error, throttled },
        }
    }

    async fn resolve_signal<T, F, Fut>(
        &self,
        namespace: Namespace,
        release_id: u64,
        fetch: F,
    ) -> Resolved<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let key = release_id.to_string();

        let cached = match self.cache.get_as::<T>(namespace, &key) {
            Some(hit) if hit.fresh => {
                debug!(release_id, %namespace, "Cache hit");
                return Resolved::Cache(hit.value);
            }
            other => other,
        };

        let what = format!("{} {}", namespace, release_id);
        match call_with_retry(&self.pacer, &self.retry, &what, fetch).await {
            Ok(value) => {
                if let Err(e) = self.cache.put_value(namespace, &key, &value) {
                    warn!(release_id, %namespace, error = %e, "Failed to write cache entry");
                }
                Resolved::Remote(value)
            }
            Err(e) => {
                let throttled = e.is_throttled();
                match cached {
                    Some(stale) => {
                        warn!(
                            release_id,
                            %namespace,
                            error = %e,
                            fetched_at = %stale.fetched_at,
                            "Remote fetch failed, using stale cache entry"
                        );
                        Resolved::Stale {
                            value: stale.value,
                            error: e.to_string(),
                            throttled,
                        }
                    }
                    None => {
                        warn!(
                            release_id,
                            %namespace,
                            error = %e,
                            "Remote fetch failed, signal unavailable"
                        );
                        Resolved::Unavailable {
                            error: e.to_string(),
                            throttled,
                        }
                    }
                }
            }
        }
    }
}
