//! Liquidity scoring.
//!
//! A score estimates how quickly a release sells, relative to the other items
//! in the same run. Only the order it induces is meaningful.
//!
//! ```text
//! pressure = want / (have + 1)
//! score    = BASELINE + DEMAND_WEIGHT * ln(1 + pressure) + market_adjustment(listings)
//! ```
//!
//! Zero listings costs `ZERO_LISTING_PENALTY`; one or more listings earns a
//! bonus that grows with the count but stays below `LISTING_BONUS`. Every
//! scored item therefore lands at or above `BASELINE - ZERO_LISTING_PENALTY`,
//! strictly above the sentinel used for unknown and unsellable items.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::discogs::{DemandSignal, MarketplaceSignal};
use crate::fetcher::SignalBundle;

pub const BASELINE: f64 = 1.0;
pub const DEMAND_WEIGHT: f64 = 1.0;
pub const ZERO_LISTING_PENALTY: f64 = 0.5;
pub const LISTING_BONUS: f64 = 0.5;

/// Score given to unknown and unsellable items.
pub const SENTINEL_SCORE: f64 = 0.0;

/// How an item was scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Both signals available and the release may be sold.
    Scored,
    /// A signal could not be resolved.
    Unknown,
    /// Discogs blocks this release from sale.
    Unsellable,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Scored => "scored",
            Classification::Unknown => "unknown",
            Classification::Unsellable => "unsellable",
        }
    }

    /// Ranking tier; lower sorts first.
    pub fn tier(&self) -> u8 {
        match self {
            Classification::Scored => 0,
            Classification::Unknown => 1,
            Classification::Unsellable => 2,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score plus classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Liquidity {
    pub score: f64,
    pub classification: Classification,
}

impl Liquidity {
    fn sentinel(classification: Classification) -> Self {
        Self {
            score: SENTINEL_SCORE,
            classification,
        }
    }
}

/// Want relative to owners; finite for `have == 0`.
pub fn demand_pressure(want: u64, have: u64) -> f64 {
    want as f64 / (have as f64 + 1.0)
}

/// Market health term for a listing count.
pub fn market_adjustment(active_listings: u64) -> f64 {
    if active_listings == 0 {
        -ZERO_LISTING_PENALTY
    } else {
        LISTING_BONUS * (2.0 - 1.0 / active_listings as f64) / 2.0
    }
}

/// Score one release from its resolved signals. `None` means unavailable.
pub fn score(demand: Option<&DemandSignal>, marketplace: Option<&MarketplaceSignal>) -> Liquidity {
    let Some(demand) = demand else {
        return Liquidity::sentinel(Classification::Unknown);
    };
    if demand.blocked_from_sale {
        return Liquidity::sentinel(Classification::Unsellable);
    }
    let Some(marketplace) = marketplace else {
        return Liquidity::sentinel(Classification::Unknown);
    };

    let pressure = demand_pressure(demand.want_count, demand.have_count);
    let score = BASELINE
        + DEMAND_WEIGHT * pressure.ln_1p()
        + market_adjustment(marketplace.active_listings);

    Liquidity {
        score,
        classification: Classification::Scored,
    }
}

pub fn score_bundle(bundle: &SignalBundle) -> Liquidity {
    score(bundle.demand.value(), bundle.marketplace.value())
}
