//! Live collection pull through the Discogs API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{CatalogItem, CategoryFilter, CollectionError, CollectionSource};
use crate::discogs::{CollectionFolder, MarketplaceService};
use crate::pacing::{call_with_retry, RequestPacer, RetryPolicy};

/// Items per page requested from the folder releases endpoint.
pub const PER_PAGE: u32 = 100;

/// Collection source backed by a user's public collection folders.
pub struct ApiCollection {
    service: Arc<dyn MarketplaceService>,
    pacer: Arc<RequestPacer>,
    retry: RetryPolicy,
    username: String,
}

impl ApiCollection {
    pub fn new(
        service: Arc<dyn MarketplaceService>,
        pacer: Arc<RequestPacer>,
        retry: RetryPolicy,
        username: impl Into<String>,
    ) -> Self {
        Self {
            service,
            pacer,
            retry,
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Folders with a name, keyed by lower-cased name.
    async fn folders(&self) -> Result<Vec<CollectionFolder>, CollectionError> {
        let username = self.username.as_str();
        let mut folders = call_with_retry(&self.pacer, &self.retry, "collection folders", || {
            self.service.collection_folders(username)
        })
        .await?;

        folders.retain(|f| !f.name.trim().is_empty());
        for folder in &mut folders {
            folder.name = folder.name.trim().to_lowercase();
        }
        folders.sort_by(|a, b| a.name.cmp(&b.name));

        if folders.is_empty() {
            return Err(CollectionError::NoFolders(self.username.clone()));
        }
        Ok(folders)
    }

    /// Every item in one folder, following pagination.
    async fn folder_items(&self, folder: &CollectionFolder) -> Result<Vec<CatalogItem>, CollectionError> {
        let username = self.username.as_str();
        let what = format!("folder '{}'", folder.name);
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let result = call_with_retry(&self.pacer, &self.retry, &what, || {
                self.service.folder_page(username, folder, page, PER_PAGE)
            })
            .await?;

            debug!(
                "Folder '{}' page {}/{}: {} items",
                folder.name,
                result.page,
                result.pages,
                result.items.len()
            );

            let more = result.has_more();
            items.extend(result.items);
            if !more {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl CollectionSource for ApiCollection {
    fn name(&self) -> &str {
        "api"
    }

    async fn load(&self, filter: &CategoryFilter) -> Result<Vec<CatalogItem>, CollectionError> {
        let folders = self.folders().await?;

        let selected: Vec<&CollectionFolder> = match filter {
            CategoryFilter::All => folders.iter().filter(|f| !f.is_all_folder()).collect(),
            CategoryFilter::Folder(name) => {
                let found: Vec<_> = folders.iter().filter(|f| f.name == *name).collect();
                if found.is_empty() {
                    return Err(CollectionError::FolderNotFound {
                        folder: name.clone(),
                        available: folders.iter().map(|f| f.name.clone()).collect(),
                    });
                }
                found
            }
        };

        if selected.is_empty() {
            return Err(CollectionError::NoFolders(self.username.clone()));
        }

        let mut items = Vec::new();
        for folder in selected {
            let folder_items = self.folder_items(folder).await?;
            info!(
                "Loaded {} items from folder '{}'",
                folder_items.len(),
                folder.name
            );
            items.extend(folder_items);
        }

        Ok(items)
    }
}
