//! Testing utilities and a mock marketplace service.
//!
//! # Example
//!
//! ```rust,ignore
//! use sellorder_core::testing::{fixtures, MockMarketplace};
//!
//! let mock = MockMarketplace::new();
//! mock.set_release(249504, fixtures::demand(50, 5), fixtures::listings(3)).await;
//! mock.fail_demand_once(249504, ServiceError::Throttled { retry_after: None }).await;
//! ```

mod mock_marketplace;

pub use mock_marketplace::{MockMarketplace, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::collection::CatalogItem;
    use crate::discogs::{CollectionFolder, DemandSignal, MarketplaceSignal, Price};

    /// A catalog item with artist and title filled in.
    pub fn catalog_item(release_id: u64, folder: &str) -> CatalogItem {
        CatalogItem {
            release_id,
            folder: folder.to_string(),
            artist: Some(format!("Artist {}", release_id)),
            title: Some(format!("Title {}", release_id)),
            label: Some("Test Label".to_string()),
            format: Some("Vinyl (LP, Album)".to_string()),
            year: Some(1990 + (release_id % 30) as u32),
            catalog_number: Some(format!("TL-{:04}", release_id)),
        }
    }

    pub fn folder(id: u64, name: &str) -> CollectionFolder {
        CollectionFolder {
            id,
            name: name.to_string(),
            count: 0,
        }
    }

    pub fn demand(want: u64, have: u64) -> DemandSignal {
        DemandSignal::new(want, have)
    }

    /// Marketplace snapshot with `count` listings priced from 10.00 USD.
    pub fn listings(count: u64) -> MarketplaceSignal {
        let lowest_price = (count > 0).then(|| Price {
            value: 10.0,
            currency: "USD".to_string(),
        });
        MarketplaceSignal::new(count, lowest_price)
    }
}
