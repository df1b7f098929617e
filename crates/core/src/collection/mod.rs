//! Collection sources.
//!
//! A collection source hands the analysis a flat list of [`CatalogItem`]s,
//! already filtered to the requested folder. Two sources exist:
//! - [`ApiCollection`]: live pull of a user's public collection folders
//! - [`CsvCollection`]: a Discogs collection CSV export

mod api;
mod csv_import;

pub use api::ApiCollection;
pub use csv_import::CsvCollection;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discogs::ServiceError;

/// One entry in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub release_id: u64,
    /// Folder label, lower-cased.
    pub folder: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub label: Option<String>,
    pub format: Option<String>,
    pub year: Option<u32>,
    pub catalog_number: Option<String>,
}

impl CatalogItem {
    /// An item with only its release id and folder known.
    pub fn new(release_id: u64, folder: impl Into<String>) -> Self {
        Self {
            release_id,
            folder: folder.into(),
            artist: None,
            title: None,
            label: None,
            format: None,
            year: None,
            catalog_number: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// `Artist - Title`, falling back to the release id.
    pub fn display_name(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{} - {}", artist, title),
            (None, Some(title)) => title.clone(),
            _ => format!("release {}", self.release_id),
        }
    }

    /// Public Discogs page for the release.
    pub fn release_url(&self) -> String {
        format!("https://www.discogs.com/release/{}", self.release_id)
    }
}

/// Which folders to keep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    /// A single folder, matched case-insensitively.
    Folder(String),
}

impl CategoryFilter {
    /// `all` (any case) or an empty string selects everything.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            CategoryFilter::All
        } else {
            CategoryFilter::Folder(value.to_lowercase())
        }
    }

    pub fn matches(&self, folder: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Folder(name) => folder.trim().to_lowercase() == *name,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => write!(f, "all"),
            CategoryFilter::Folder(name) => write!(f, "{}", name),
        }
    }
}

/// Errors loading a collection.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Discogs request failed: {0}")]
    Service(#[from] ServiceError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Folder '{folder}' not found. Available folders: {}", .available.join(", "))]
    FolderNotFound {
        folder: String,
        available: Vec<String>,
    },

    #[error("No collection folders found for user '{0}' (missing user or private collection)")]
    NoFolders(String),
}

/// Anything that can produce a filtered collection.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Load every item that passes the filter.
    async fn load(&self, filter: &CategoryFilter) -> Result<Vec<CatalogItem>, CollectionError>;
}
