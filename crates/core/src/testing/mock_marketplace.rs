//! Mock marketplace service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::collection::CatalogItem;
use crate::discogs::{
    CollectionFolder, DemandSignal, FolderPage, MarketplaceService, MarketplaceSignal,
    ServiceError,
};

/// A recorded service call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Demand { release_id: u64 },
    Marketplace { release_id: u64 },
    CollectionFolders { username: String },
    FolderPage { folder_id: u64, page: u32, per_page: u32 },
}

/// Mock implementation of the MarketplaceService trait.
///
/// Provides controllable behavior for testing:
/// - Return configured signals per release
/// - Serve collection folders with pagination
/// - Track calls for assertions
/// - Inject one-shot or permanent failures
///
/// Releases without configured signals answer `NotFound` for demand and an
/// empty marketplace for stats, as the Discogs API does.
#[derive(Debug)]
pub struct MockMarketplace {
    demand: Arc<RwLock<HashMap<u64, DemandSignal>>>,
    marketplace: Arc<RwLock<HashMap<u64, MarketplaceSignal>>>,
    folders: Arc<RwLock<Vec<(CollectionFolder, Vec<CatalogItem>)>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    demand_errors: Arc<RwLock<HashMap<u64, VecDeque<ServiceError>>>>,
    marketplace_errors: Arc<RwLock<HashMap<u64, VecDeque<ServiceError>>>>,
    folder_errors: Arc<RwLock<VecDeque<ServiceError>>>,
    /// Releases whose every call fails with a copy of this error.
    failing: Arc<RwLock<HashMap<u64, ServiceError>>>,
}

impl Default for MockMarketplace {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMarketplace {
    pub fn new() -> Self {
        Self {
            demand: Arc::new(RwLock::new(HashMap::new())),
            marketplace: Arc::new(RwLock::new(HashMap::new())),
            folders: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            demand_errors: Arc::new(RwLock::new(HashMap::new())),
            marketplace_errors: Arc::new(RwLock::new(HashMap::new())),
            folder_errors: Arc::new(RwLock::new(VecDeque::new())),
            failing: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // =========================================================================
    // Signal Configuration
    // =========================================================================

    /// Set both signals for a release.
    pub async fn set_release(&self, release_id: u64, demand: DemandSignal, market: MarketplaceSignal) {
        self.demand.write().await.insert(release_id, demand);
        self.marketplace.write().await.insert(release_id, market);
    }

    pub async fn set_demand(&self, release_id: u64, demand: DemandSignal) {
        self.demand.write().await.insert(release_id, demand);
    }

    pub async fn set_marketplace(&self, release_id: u64, market: MarketplaceSignal) {
        self.marketplace.write().await.insert(release_id, market);
    }

    // =========================================================================
    // Collection Configuration
    // =========================================================================

    /// Add a folder and its items.
    pub async fn add_folder(&self, folder: CollectionFolder, items: Vec<CatalogItem>) {
        self.folders.write().await.push((folder, items));
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// The next demand call for the release fails with this error.
    pub async fn fail_demand_once(&self, release_id: u64, error: ServiceError) {
        self.demand_errors
            .write()
            .await
            .entry(release_id)
            .or_default()
            .push_back(error);
    }

    /// The next marketplace call for the release fails with this error.
    pub async fn fail_marketplace_once(&self, release_id: u64, error: ServiceError) {
        self.marketplace_errors
            .write()
            .await
            .entry(release_id)
            .or_default()
            .push_back(error);
    }

    /// The next folder listing fails with this error.
    pub async fn fail_folders_once(&self, error: ServiceError) {
        self.folder_errors.write().await.push_back(error);
    }

    /// Every call for the release fails until [`recover`](Self::recover).
    pub async fn fail_always(&self, release_id: u64, error: ServiceError) {
        self.failing.write().await.insert(release_id, error);
    }

    pub async fn recover(&self, release_id: u64) {
        self.failing.write().await.remove(&release_id);
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    /// All recorded calls, in order.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    pub async fn demand_calls(&self, release_id: u64) -> usize {
        self.count_calls(|c| *c == RecordedCall::Demand { release_id })
            .await
    }

    pub async fn marketplace_calls(&self, release_id: u64) -> usize {
        self.count_calls(|c| *c == RecordedCall::Marketplace { release_id })
            .await
    }

    /// Calls that hit the release or marketplace endpoints.
    pub async fn signal_calls(&self) -> usize {
        self.count_calls(|c| {
            matches!(
                c,
                RecordedCall::Demand { .. } | RecordedCall::Marketplace { .. }
            )
        })
        .await
    }

    pub async fn page_requests(&self) -> usize {
        self.count_calls(|c| matches!(c, RecordedCall::FolderPage { .. }))
            .await
    }

    pub async fn requested_folder_ids(&self) -> Vec<u64> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCall::FolderPage { folder_id, .. } => Some(*folder_id),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn count_calls(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| pred(c)).count()
    }

    async fn record(&self, call: RecordedCall) {
        self.calls.write().await.push(call);
    }

    async fn injected_error(
        &self,
        queue: &RwLock<HashMap<u64, VecDeque<ServiceError>>>,
        release_id: u64,
    ) -> Option<ServiceError> {
        if let Some(error) = self.failing.read().await.get(&release_id) {
            return Some(copy_error(error));
        }
        queue
            .write()
            .await
            .get_mut(&release_id)
            .and_then(|q| q.pop_front())
    }
}

/// `ServiceError` is not `Clone` because of the reqwest variant.
fn copy_error(error: &ServiceError) -> ServiceError {
    match error {
        ServiceError::Http(e) => ServiceError::Transient(e.to_string()),
        ServiceError::Throttled { retry_after } => ServiceError::Throttled {
            retry_after: *retry_after,
        },
        ServiceError::Transient(m) => ServiceError::Transient(m.clone()),
        ServiceError::NotFound(m) => ServiceError::NotFound(m.clone()),
        ServiceError::Api { status, message } => ServiceError::Api {
            status: *status,
            message: message.clone(),
        },
        ServiceError::Parse(m) => ServiceError::Parse(m.clone()),
        ServiceError::NotConfigured(m) => ServiceError::NotConfigured(m.clone()),
    }
}

#[async_trait]
impl MarketplaceService for MockMarketplace {
    async fn demand(&self, release_id: u64) -> Result<DemandSignal, ServiceError> {
        self.record(RecordedCall::Demand { release_id }).await;

        if let Some(error) = self.injected_error(&self.demand_errors, release_id).await {
            return Err(error);
        }

        self.demand
            .read()
            .await
            .get(&release_id)
            .copied()
            .ok_or_else(|| ServiceError::NotFound(format!("release {}", release_id)))
    }

    async fn marketplace(&self, release_id: u64) -> Result<MarketplaceSignal, ServiceError> {
        self.record(RecordedCall::Marketplace { release_id }).await;

        if let Some(error) = self
            .injected_error(&self.marketplace_errors, release_id)
            .await
        {
            return Err(error);
        }

        Ok(self
            .marketplace
            .read()
            .await
            .get(&release_id)
            .cloned()
            .unwrap_or_else(MarketplaceSignal::empty))
    }

    async fn collection_folders(&self, username: &str) -> Result<Vec<CollectionFolder>, ServiceError> {
        self.record(RecordedCall::CollectionFolders {
            username: username.to_string(),
        })
        .await;

        if let Some(error) = self.folder_errors.write().await.pop_front() {
            return Err(error);
        }

        Ok(self
            .folders
            .read()
            .await
            .iter()
            .map(|(folder, _)| folder.clone())
            .collect())
    }

    async fn folder_page(
        &self,
        _username: &str,
        folder: &CollectionFolder,
        page: u32,
        per_page: u32,
    ) -> Result<FolderPage, ServiceError> {
        self.record(RecordedCall::FolderPage {
            folder_id: folder.id,
            page,
            per_page,
        })
        .await;

        let folders = self.folders.read().await;
        let Some((_, items)) = folders.iter().find(|(f, _)| f.id == folder.id) else {
            return Ok(FolderPage::empty(page));
        };

        let per_page = per_page.max(1) as usize;
        let pages = items.len().div_ceil(per_page) as u32;
        let start = (page.saturating_sub(1) as usize) * per_page;

        Ok(FolderPage {
            items: items.iter().skip(start).take(per_page).cloned().collect(),
            page,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_unknown_release() {
        let mock = MockMarketplace::new();
        assert!(matches!(mock.demand(1).await, Err(ServiceError::NotFound(_))));
        assert_eq!(mock.marketplace(1).await.unwrap(), MarketplaceSignal::empty());
        assert_eq!(mock.signal_calls().await, 2);
    }

    #[tokio::test]
    async fn test_one_shot_error() {
        let mock = MockMarketplace::new();
        mock.set_demand(1, DemandSignal::new(3, 4)).await;
        mock.fail_demand_once(1, ServiceError::Transient("502".to_string()))
            .await;

        assert!(mock.demand(1).await.is_err());
        assert_eq!(mock.demand(1).await.unwrap(), DemandSignal::new(3, 4));
    }

    #[tokio::test]
    async fn test_fail_always_until_recover() {
        let mock = MockMarketplace::new();
        mock.set_demand(1, DemandSignal::new(3, 4)).await;
        mock.fail_always(1, ServiceError::Throttled { retry_after: None })
            .await;

        assert!(mock.demand(1).await.unwrap_err().is_throttled());
        assert!(mock.marketplace(1).await.unwrap_err().is_throttled());

        mock.recover(1).await;
        assert!(mock.demand(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_folder_pagination() {
        let mock = MockMarketplace::new();
        let folder = fixtures::folder(3, "selling");
        let items = (1..=5).map(|id| fixtures::catalog_item(id, "selling")).collect();
        mock.add_folder(folder.clone(), items).await;

        let page = mock.folder_page("u", &folder, 3, 2).await.unwrap();
        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more());
        assert_eq!(mock.requested_folder_ids().await, vec![3]);
    }
}
