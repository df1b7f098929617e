pub mod analysis;
pub mod cache;
pub mod collection;
pub mod config;
pub mod discogs;
pub mod fetcher;
pub mod pacing;
pub mod ranking;
pub mod report;
pub mod scoring;
pub mod testing;

pub use analysis::{analyze, AnalysisReport, RunSummary};
pub use cache::{
    CacheBackend, CacheError, FreshnessPolicy, MemoryCacheBackend, Namespace, SignalCache,
    SqliteCacheBackend,
};
pub use collection::{
    ApiCollection, CatalogItem, CategoryFilter, CollectionError, CollectionSource, CsvCollection,
};
pub use config::{
    load_config, load_config_from_str, load_config_optional, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use discogs::{
    DemandSignal, DiscogsClient, MarketplaceService, MarketplaceSignal, Price, ServiceError,
};
pub use fetcher::{FetchStats, Resolved, SignalBundle, SignalFetcher, SignalStatus};
pub use pacing::{RequestPacer, RetryPolicy};
pub use ranking::{rank, RankedItem, ScoredItem};
pub use report::{default_output_path, write_report, ReportError};
pub use scoring::{score, Classification, Liquidity};
