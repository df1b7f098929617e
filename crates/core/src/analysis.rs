//! One analysis run: resolve signals, score, rank, summarize.

use serde::Serialize;
use tracing::{info, warn};

use crate::collection::CatalogItem;
use crate::fetcher::{FetchStats, SignalFetcher, SignalStatus};
use crate::pacing::PacerStats;
use crate::ranking::{rank, RankedItem, ScoredItem};
use crate::scoring::Classification;

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub items: usize,
    pub releases: usize,
    pub scored: usize,
    pub unknown: usize,
    pub unsellable: usize,
    /// Items scored from at least one stale signal.
    pub degraded: usize,
    /// Releases that needed at least one remote call.
    pub remote_releases: usize,
    /// Releases left unknown purely because of throttling.
    pub throttled_releases: usize,
}

impl RunSummary {
    /// Every release that had to go remote ended unknown because of throttling.
    pub fn fully_throttled(&self) -> bool {
        self.remote_releases > 0 && self.throttled_releases == self.remote_releases
    }

    /// Whether the run produced anything worth a warning.
    pub fn has_problems(&self) -> bool {
        self.degraded > 0 || self.unknown > 0
    }

    /// Log the summary; degraded runs log at warn level.
    pub fn log(&self) {
        info!(
            items = self.items,
            releases = self.releases,
            scored = self.scored,
            unknown = self.unknown,
            unsellable = self.unsellable,
            "Analysis complete"
        );

        if self.fully_throttled() {
            warn!(
                "Rate limit exhausted: all {} releases that needed a remote fetch are unknown. \
                 Rerun later; cached signals will be reused.",
                self.remote_releases
            );
        } else if self.has_problems() {
            warn!(
                degraded = self.degraded,
                unknown = self.unknown,
                throttled = self.throttled_releases,
                "Some items were scored from stale signals or could not be scored"
            );
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub ranked: Vec<RankedItem>,
    pub stats: FetchStats,
    pub pacer: PacerStats,
    pub summary: RunSummary,
}

/// Fetch, score and rank a collection.
///
/// No single item's failure aborts the run; unresolved items rank as unknown.
pub async fn analyze(
    items: Vec<CatalogItem>,
    fetcher: &SignalFetcher,
    workers: usize,
) -> AnalysisReport {
    let bundles = fetcher.resolve_all(&items, workers).await;
    let stats = FetchStats::from_bundles(bundles.values());

    let mut summary = RunSummary {
        items: items.len(),
        releases: bundles.len(),
        ..RunSummary::default()
    };
    for bundle in bundles.values() {
        if bundle.went_remote() {
            summary.remote_releases += 1;
        }
        if bundle.throttled() && bundle.status() == SignalStatus::Unavailable {
            summary.throttled_releases += 1;
        }
    }

    let mut scored = Vec::with_capacity(items.len());
    for item in items {
        let Some(bundle) = bundles.get(&item.release_id).cloned() else {
            warn!(release_id = item.release_id, "No signals resolved for item, skipping");
            continue;
        };
        let scored_item = ScoredItem::new(item, bundle);

        match scored_item.classification() {
            Classification::Scored => summary.scored += 1,
            Classification::Unknown => summary.unknown += 1,
            Classification::Unsellable => summary.unsellable += 1,
        }
        if scored_item.bundle.is_degraded() {
            summary.degraded += 1;
        }
        scored.push(scored_item);
    }

    let report = AnalysisReport {
        ranked: rank(scored),
        stats,
        pacer: fetcher.pacer().stats(),
        summary,
    };
    report.summary.log();
    report
}
