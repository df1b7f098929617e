mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sellorder_core::{
    analyze, config::CacheConfig, default_output_path, load_config, load_config_optional,
    validate_config, write_report, ApiCollection, CategoryFilter, CollectionSource, CsvCollection,
    DiscogsClient, FreshnessPolicy, MarketplaceService, RequestPacer, RetryPolicy,
    SanitizedConfig, SignalCache, SignalFetcher, SqliteCacheBackend,
};

use args::{Args, SourceKind};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    args.check_source()?;

    // Load configuration
    let config_path = args.config_path();
    let mut config = if args.config.is_some() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        load_config_optional(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    };
    args.apply_overrides(&mut config);

    validate_config(&config, args.requires_token()).context("Configuration validation failed")?;
    if config.discogs.token.trim().is_empty() {
        warn!("No Discogs token set; unauthenticated requests get a lower rate limit");
    }
    debug!("Effective configuration: {:?}", SanitizedConfig::from(&config));

    info!(
        "TTL: marketplace={}s, release={}s",
        config.cache.marketplace_ttl_secs, config.cache.release_ttl_secs
    );
    info!(
        "Rate limit: {}ms between requests (~{:.0}/min), {} attempts per request",
        config.rate_limit.min_interval_ms,
        config.rate_limit.requests_per_minute(),
        config.rate_limit.max_attempts
    );

    let cache = open_cache(&config.cache);
    for (namespace, count) in cache.counts() {
        debug!("Cache entries: {}={}", namespace, count);
    }

    let service: Arc<dyn MarketplaceService> = Arc::new(
        DiscogsClient::new(&config.discogs).context("Failed to create Discogs client")?,
    );
    let pacer = Arc::new(RequestPacer::from_config(&config.rate_limit));
    let retry = RetryPolicy::from_config(&config.rate_limit);

    // Load the collection
    let source: Box<dyn CollectionSource> = match args.source {
        SourceKind::Api => {
            let user = args.user.clone().unwrap_or_default();
            Box::new(ApiCollection::new(
                Arc::clone(&service),
                Arc::clone(&pacer),
                retry,
                user.trim(),
            ))
        }
        SourceKind::Csv => Box::new(CsvCollection::new(args.input.clone().unwrap_or_default())),
    };
    let filter = CategoryFilter::parse(&args.category);

    let items = source
        .load(&filter)
        .await
        .with_context(|| format!("Failed to load collection ({} source)", source.name()))?;
    info!(
        "Loaded {} items (source={}, category={})",
        items.len(),
        source.name(),
        filter
    );
    if items.is_empty() {
        warn!("No items matched category '{}'", filter);
    }

    // Fetch, score, rank
    let workers = config.fetcher.workers;
    let fetcher = SignalFetcher::new(service, cache, pacer, retry);
    let report = analyze(items, &fetcher, workers).await;

    info!(
        "Cache hits: marketplace={}, release={}",
        report.stats.marketplace.cache_hits, report.stats.release.cache_hits
    );
    info!(
        "Remote fetches: marketplace={}, release={} ({} requests, {} throttle back-offs)",
        report.stats.marketplace.remote,
        report.stats.release.remote,
        report.pacer.granted,
        report.pacer.back_offs
    );

    // Write the report
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(chrono::Local::now().date_naive()));
    write_report(&output, &report.ranked)
        .with_context(|| format!("Failed to write report to {:?}", output))?;

    info!("Done. Output written to {:?}", output);
    Ok(())
}

/// Open the configured cache, degrading to an in-memory cache on failure.
fn open_cache(config: &CacheConfig) -> SignalCache {
    let policy = FreshnessPolicy::from_config(config);

    if !config.enabled {
        info!("Cache disabled; signals will not be kept between runs");
        return SignalCache::in_memory(policy);
    }

    match SqliteCacheBackend::open(&config.path) {
        Ok(backend) => {
            info!("Cache: {:?}", config.path);
            SignalCache::new(Arc::new(backend), policy)
        }
        Err(e) => {
            warn!(
                "Could not open cache at {:?} ({}); continuing with an in-memory cache",
                config.path, e
            );
            SignalCache::in_memory(policy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellorder_core::Namespace;
    use tempfile::TempDir;

    #[test]
    fn test_open_cache_disabled_is_in_memory() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            enabled: false,
            path: dir.path().join("cache.db"),
            ..CacheConfig::default()
        };

        let cache = open_cache(&config);
        cache.put_value(Namespace::Release, "1", &1u64).unwrap();
        assert!(!config.path.exists());
    }

    #[test]
    fn test_open_cache_creates_file() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            path: dir.path().join("cache.db"),
            ..CacheConfig::default()
        };

        let cache = open_cache(&config);
        cache.put_value(Namespace::Release, "1", &1u64).unwrap();
        assert!(config.path.exists());
        assert!(cache.is_fresh(Namespace::Release, "1"));
    }

    #[test]
    fn test_open_cache_unwritable_path_falls_back() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            path: dir.path().join("missing").join("cache.db"),
            ..CacheConfig::default()
        };

        let cache = open_cache(&config);
        cache.put_value(Namespace::Release, "1", &1u64).unwrap();
        assert!(cache.get(Namespace::Release, "1").is_some());
    }
}
