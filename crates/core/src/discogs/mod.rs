//! Discogs marketplace and collection access.
//!
//! Two per-release queries feed the liquidity score:
//! - release details: community want/have counts and the blocked-from-sale flag
//! - marketplace stats: number of active listings and the lowest price
//!
//! The collection queries (folders, folder contents) feed the API collection
//! source. Callers are responsible for pacing; see [`crate::pacing`].

mod client;
mod types;

pub use client::DiscogsClient;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::collection::CatalogItem;

/// Errors from the remote service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered 429.
    #[error("Rate limit exceeded{}", retry_suffix(.retry_after))]
    Throttled { retry_after: Option<Duration> },

    /// Server-side failure (5xx) worth retrying.
    #[error("Service unavailable: {0}")]
    Transient(String),

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client not configured (missing token, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl ServiceError {
    /// Whether the same request may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Throttled { .. } | ServiceError::Transient(_) => true,
            ServiceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, ServiceError::Throttled { .. })
    }

    /// Server-specified wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}s", d.as_secs()))
        .unwrap_or_default()
}

/// Read-only queries against the catalog/marketplace service.
#[async_trait]
pub trait MarketplaceService: Send + Sync {
    /// Demand and sellability for a release.
    async fn demand(&self, release_id: u64) -> Result<DemandSignal, ServiceError>;

    /// Current marketplace snapshot for a release.
    async fn marketplace(&self, release_id: u64) -> Result<MarketplaceSignal, ServiceError>;

    /// A user's collection folders.
    async fn collection_folders(&self, username: &str) -> Result<Vec<CollectionFolder>, ServiceError>;

    /// One page of a collection folder. Items are labelled with the folder name.
    async fn folder_page(
        &self,
        username: &str,
        folder: &CollectionFolder,
        page: u32,
        per_page: u32,
    ) -> Result<FolderPage, ServiceError>;
}

/// One page of collection items.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderPage {
    pub items: Vec<CatalogItem>,
    pub page: u32,
    pub pages: u32,
}

impl FolderPage {
    pub fn empty(page: u32) -> Self {
        Self {
            items: Vec::new(),
            page,
            pages: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        self.pages > 0 && self.page < self.pages
    }
}
