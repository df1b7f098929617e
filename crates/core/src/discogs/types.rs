//! Signal types returned by the marketplace service.

use serde::{Deserialize, Serialize};

/// Long-cycle demand data for a release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemandSignal {
    /// Users who want the release.
    pub want_count: u64,
    /// Users who own the release.
    pub have_count: u64,
    /// Discogs does not allow this release to be sold.
    #[serde(default)]
    pub blocked_from_sale: bool,
}

impl DemandSignal {
    pub fn new(want_count: u64, have_count: u64) -> Self {
        Self {
            want_count,
            have_count,
            blocked_from_sale: false,
        }
    }

    pub fn blocked(mut self) -> Self {
        self.blocked_from_sale = true;
        self
    }
}

/// A price in some currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub value: f64,
    pub currency: String,
}

/// Short-cycle marketplace snapshot for a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketplaceSignal {
    /// Copies currently for sale.
    pub active_listings: u64,
    /// Lowest asking price; absent when nothing is listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest_price: Option<Price>,
}

impl MarketplaceSignal {
    /// Nothing listed.
    pub fn empty() -> Self {
        Self {
            active_listings: 0,
            lowest_price: None,
        }
    }

    pub fn new(active_listings: u64, lowest_price: Option<Price>) -> Self {
        Self {
            active_listings,
            lowest_price,
        }
    }
}

/// A folder in a user's collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionFolder {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

impl CollectionFolder {
    /// Folder 0 is the virtual "All" folder.
    pub fn is_all_folder(&self) -> bool {
        self.id == 0
    }
}
