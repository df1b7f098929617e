//! Resolution results for per-release signals.

use std::fmt;

use crate::cache::Namespace;
use crate::discogs::{DemandSignal, MarketplaceSignal};

/// Where a resolved signal came from, or why it is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// Fresh cache entry.
    Cache(T),
    /// Fetched from the service this run.
    Remote(T),
    /// The remote call failed; this is the last cached value, past its TTL.
    Stale {
        value: T,
        error: String,
        throttled: bool,
    },
    /// The remote call failed and nothing was cached.
    Unavailable { error: String, throttled: bool },
}

impl<T> Resolved<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Resolved::Cache(value) | Resolved::Remote(value) | Resolved::Stale { value, .. } => {
                Some(value)
            }
            Resolved::Unavailable { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Resolved::Stale { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Resolved::Unavailable { .. })
    }

    /// The remote call failed because of sustained throttling.
    pub fn is_throttled(&self) -> bool {
        match self {
            Resolved::Stale { throttled, .. } | Resolved::Unavailable { throttled, .. } => {
                *throttled
            }
            _ => false,
        }
    }

    /// Whether a remote call was made for this signal.
    pub fn went_remote(&self) -> bool {
        !matches!(self, Resolved::Cache(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Resolved::Stale { error, .. } | Resolved::Unavailable { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolved::Cache(_) => "cache",
            Resolved::Remote(_) => "remote",
            Resolved::Stale { .. } => "stale",
            Resolved::Unavailable { .. } => "unavailable",
        }
    }
}

/// Overall state of a bundle's signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    /// Both signals are current.
    Ok,
    /// At least one signal is a stale fallback.
    Degraded,
    /// At least one signal could not be resolved.
    Unavailable,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Ok => "ok",
            SignalStatus::Degraded => "degraded",
            SignalStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Both signals for one release.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBundle {
    pub release_id: u64,
    pub demand: Resolved<DemandSignal>,
    pub marketplace: Resolved<MarketplaceSignal>,
}

impl SignalBundle {
    /// Any part fell back to a stale value.
    pub fn is_degraded(&self) -> bool {
        self.demand.is_stale() || self.marketplace.is_stale()
    }

    pub fn status(&self) -> SignalStatus {
        if self.demand.is_unavailable() || self.marketplace.is_unavailable() {
            SignalStatus::Unavailable
        } else if self.is_degraded() {
            SignalStatus::Degraded
        } else {
            SignalStatus::Ok
        }
    }

    /// Any remote call for this release was needed.
    pub fn went_remote(&self) -> bool {
        self.demand.went_remote() || self.marketplace.went_remote()
    }

    /// Every failure in this bundle was throttling.
    pub fn throttled(&self) -> bool {
        let failed = [
            (self.demand.error().is_some(), self.demand.is_throttled()),
            (
                self.marketplace.error().is_some(),
                self.marketplace.is_throttled(),
            ),
        ];
        failed.iter().any(|(err, _)| *err) && failed.iter().all(|(err, thr)| !*err || *thr)
    }
}

/// Counters for one namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamespaceStats {
    pub cache_hits: usize,
    pub remote: usize,
    pub stale: usize,
    pub unavailable: usize,
    /// Failures (stale or unavailable) caused by throttling.
    pub throttled: usize,
}

impl NamespaceStats {
    fn record<T>(&mut self, resolved: &Resolved<T>) {
        match resolved {
            Resolved::Cache(_) => self.cache_hits += 1,
            Resolved::Remote(_) => self.remote += 1,
            Resolved::Stale { .. } => self.stale += 1,
            Resolved::Unavailable { .. } => self.unavailable += 1,
        }
        if resolved.is_throttled() {
            self.throttled += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.cache_hits + self.remote + self.stale + self.unavailable
    }
}

/// Per-namespace tally over a set of bundles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub release: NamespaceStats,
    pub marketplace: NamespaceStats,
}

impl FetchStats {
    pub fn from_bundles<'a>(bundles: impl IntoIterator<Item = &'a SignalBundle>) -> Self {
        let mut stats = Self::default();
        for bundle in bundles {
            stats.release.record(&bundle.demand);
            stats.marketplace.record(&bundle.marketplace);
        }
        stats
    }

    pub fn namespace(&self, namespace: Namespace) -> &NamespaceStats {
        match namespace {
            Namespace::Release => &self.release,
            Namespace::Marketplace => &self.marketplace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable<T>(throttled: bool) -> Resolved<T> {
        Resolved::Unavailable {
            error: "boom".to_string(),
            throttled,
        }
    }

    #[test]
    fn test_bundle_status() {
        let mut bundle = SignalBundle {
            release_id: 1,
            demand: Resolved::Cache(DemandSignal::new(1, 1)),
            marketplace: Resolved::Remote(MarketplaceSignal::empty()),
        };
        assert_eq!(bundle.status(), SignalStatus::Ok);
        assert!(!bundle.is_degraded());
        assert!(bundle.went_remote());

        bundle.demand = Resolved::Stale {
            value: DemandSignal::new(1, 1),
            error: "503".to_string(),
            throttled: false,
        };
        assert_eq!(bundle.status(), SignalStatus::Degraded);
        assert!(bundle.is_degraded());

        bundle.marketplace = unavailable(true);
        assert_eq!(bundle.status(), SignalStatus::Unavailable);
        assert!(!bundle.throttled());
    }

    #[test]
    fn test_bundle_throttled_only_when_every_failure_was_throttling() {
        let bundle = SignalBundle {
            release_id: 1,
            demand: unavailable(true),
            marketplace: Resolved::Cache(MarketplaceSignal::empty()),
        };
        assert!(bundle.throttled());

        let bundle = SignalBundle {
            release_id: 1,
            demand: Resolved::Cache(DemandSignal::new(1, 1)),
            marketplace: Resolved::Cache(MarketplaceSignal::empty()),
        };
        assert!(!bundle.throttled());
    }

    #[test]
    fn test_fetch_stats() {
        let bundles = vec![
            SignalBundle {
                release_id: 1,
                demand: Resolved::Cache(DemandSignal::new(1, 1)),
                marketplace: Resolved::Remote(MarketplaceSignal::empty()),
            },
            SignalBundle {
                release_id: 2,
                demand: unavailable(true),
                marketplace: unavailable(false),
            },
        ];

        let stats = FetchStats::from_bundles(&bundles);
        assert_eq!(stats.release.cache_hits, 1);
        assert_eq!(stats.release.unavailable, 1);
        assert_eq!(stats.release.throttled, 1);
        assert_eq!(stats.marketplace.remote, 1);
        assert_eq!(stats.marketplace.unavailable, 1);
        assert_eq!(stats.marketplace.throttled, 0);
        assert_eq!(stats.namespace(Namespace::Release).total(), 2);
    }
}
