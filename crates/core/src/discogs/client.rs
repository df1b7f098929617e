//! Discogs API client.
//!
//! Discogs requires:
//! - a User-Agent identifying the application
//! - `Authorization: Discogs token=...` for the 60 requests/minute tier;
//!   without a token only public resources are served, at a lower limit
//!
//! This client does not pace itself; callers go through a shared
//! [`RequestPacer`](crate::pacing::RequestPacer).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    CollectionFolder, DemandSignal, FolderPage, MarketplaceService, MarketplaceSignal, Price,
    ServiceError,
};
use crate::collection::CatalogItem;
use crate::config::DiscogsConfig;

/// Discogs API client.
pub struct DiscogsClient {
    client: Client,
    base_url: String,
    currency: String,
}

impl DiscogsClient {
    /// Create a new Discogs client.
    pub fn new(config: &DiscogsConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        let token = config.token.trim();
        if token.is_empty() {
            debug!("No Discogs token configured, using unauthenticated access");
        } else {
            let auth = HeaderValue::from_str(&format!("Discogs token={}", token)).map_err(|e| {
                ServiceError::NotConfigured(format!("Invalid Discogs token: {}", e))
            })?;
            headers.insert(AUTHORIZATION, auth);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            currency: config.currency.to_uppercase(),
        })
    }

    /// GET a JSON resource, mapping status codes onto [`ServiceError`].
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            warn!("Discogs rate limit exceeded (retry after {:?})", retry_after);
            return Err(ServiceError::Throttled { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(url.to_string()));
        }
        if status.is_server_error() {
            return Err(ServiceError::Transient(format!("{} from {}", status, url)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: truncate(&body, 300),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl MarketplaceService for DiscogsClient {
    async fn demand(&self, release_id: u64) -> Result<DemandSignal, ServiceError> {
        let url = format!("{}/releases/{}", self.base_url, release_id);
        debug!("Discogs release: id={}", release_id);

        let release: ReleaseDto = self.get_json(&url, &[]).await?;
        Ok(release.into())
    }

    async fn marketplace(&self, release_id: u64) -> Result<MarketplaceSignal, ServiceError> {
        let url = format!("{}/marketplace/stats/{}", self.base_url, release_id);
        debug!("Discogs marketplace stats: id={}", release_id);

        match self
            .get_json::<StatsDto>(&url, &[("curr_abbr", self.currency.clone())])
            .await
        {
            Ok(stats) => Ok(stats.into()),
            // No stats resource means nothing has ever been listed.
            Err(ServiceError::NotFound(_)) => Ok(MarketplaceSignal::empty()),
            Err(e) => Err(e),
        }
    }

    async fn collection_folders(&self, username: &str) -> Result<Vec<CollectionFolder>, ServiceError> {
        let url = format!(
            "{}/users/{}/collection/folders",
            self.base_url,
            urlencoding::encode(username)
        );
        debug!("Discogs collection folders: user={}", username);

        let response: FoldersDto = self.get_json(&url, &[]).await?;
        Ok(response
            .folders
            .into_iter()
            .filter(|f| !f.name.trim().is_empty())
            .collect())
    }

    async fn folder_page(
        &self,
        username: &str,
        folder: &CollectionFolder,
        page: u32,
        per_page: u32,
    ) -> Result<FolderPage, ServiceError> {
        let url = format!(
            "{}/users/{}/collection/folders/{}/releases",
            self.base_url,
            urlencoding::encode(username),
            folder.id
        );
        debug!(
            "Discogs folder page: user={}, folder={}, page={}",
            username, folder.name, page
        );

        let response: FolderReleasesDto = match self
            .get_json(
                &url,
                &[("page", page.to_string()), ("per_page", per_page.to_string())],
            )
            .await
        {
            Ok(response) => response,
            Err(ServiceError::NotFound(_)) => return Ok(FolderPage::empty(page)),
            Err(e) => return Err(e),
        };

        let folder_label = folder.name.trim().to_lowercase();
        let items = response
            .releases
            .into_iter()
            .filter_map(|r| r.basic_information.into_item(&folder_label))
            .collect();

        Ok(FolderPage {
            items,
            page,
            pages: response.pagination.map(|p| p.pages).unwrap_or(0),
        })
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ============================================================================
// Discogs API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReleaseDto {
    #[serde(default)]
    community: Option<CommunityDto>,
    #[serde(default)]
    blocked_from_sale: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CommunityDto {
    #[serde(default)]
    want: Option<u64>,
    #[serde(default)]
    have: Option<u64>,
}

impl From<ReleaseDto> for DemandSignal {
    fn from(dto: ReleaseDto) -> Self {
        let (want, have) = dto
            .community
            .map(|c| (c.want.unwrap_or(0), c.have.unwrap_or(0)))
            .unwrap_or((0, 0));
        Self {
            want_count: want,
            have_count: have,
            blocked_from_sale: dto.blocked_from_sale.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsDto {
    #[serde(default)]
    num_for_sale: Option<u64>,
    #[serde(default)]
    lowest_price: Option<PriceDto>,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    value: f64,
    #[serde(default)]
    currency: Option<String>,
}

impl From<StatsDto> for MarketplaceSignal {
    fn from(dto: StatsDto) -> Self {
        let active_listings = dto.num_for_sale.unwrap_or(0);
        let lowest_price = if active_listings == 0 {
            None
        } else {
            dto.lowest_price.map(|p| Price {
                value: p.value,
                currency: p.currency.unwrap_or_default(),
            })
        };
        Self {
            active_listings,
            lowest_price,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FoldersDto {
    #[serde(default)]
    folders: Vec<CollectionFolder>,
}

#[derive(Debug, Deserialize)]
struct FolderReleasesDto {
    #[serde(default)]
    pagination: Option<PaginationDto>,
    #[serde(default)]
    releases: Vec<CollectionReleaseDto>,
}

#[derive(Debug, Deserialize)]
struct PaginationDto {
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct CollectionReleaseDto {
    basic_information: BasicInformationDto,
}

#[derive(Debug, Deserialize)]
struct BasicInformationDto {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    artists: Vec<NameDto>,
    #[serde(default)]
    labels: Vec<LabelDto>,
    #[serde(default)]
    formats: Vec<FormatDto>,
}

#[derive(Debug, Deserialize)]
struct NameDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LabelDto {
    name: String,
    #[serde(default)]
    catno: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatDto {
    name: String,
    #[serde(default)]
    descriptions: Vec<String>,
}

impl BasicInformationDto {
    fn into_item(self, folder: &str) -> Option<CatalogItem> {
        let release_id = self.id?;
        let first_label = self.labels.into_iter().next();
        let format = self.formats.into_iter().next().map(|f| {
            if f.descriptions.is_empty() {
                f.name
            } else {
                format!("{} ({})", f.name, f.descriptions.join(", "))
            }
        });

        Some(CatalogItem {
            release_id,
            folder: folder.to_string(),
            artist: self.artists.into_iter().next().map(|a| a.name),
            title: self.title,
            label: first_label.as_ref().map(|l| l.name.clone()),
            format,
            year: self.year.filter(|y| *y > 0),
            catalog_number: first_label.and_then(|l| l.catno),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_without_token() {
        let config = DiscogsConfig::default();
        assert!(config.token.is_empty());
        assert!(DiscogsClient::new(&config).is_ok());
    }

    #[test]
    fn test_client_rejects_unprintable_token() {
        let config = DiscogsConfig {
            token: "abc\n123".to_string(),
            ..DiscogsConfig::default()
        };
        let result = DiscogsClient::new(&config);
        assert!(matches!(result, Err(ServiceError::NotConfigured(_))));
    }

    #[test]
    fn test_client_builds_with_token() {
        let config = DiscogsConfig {
            token: "abc123".to_string(),
            base_url: "https://api.discogs.com/".to_string(),
            ..DiscogsConfig::default()
        };
        let client = DiscogsClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://api.discogs.com");
        assert_eq!(client.currency, "USD");
    }

    #[test]
    fn test_release_dto_to_demand() {
        let json = r#"{
            "id": 249504,
            "title": "Never Gonna Give You Up",
            "blocked_from_sale": false,
            "community": {"have": 1203, "want": 412, "rating": {"average": 3.9}}
        }"#;
        let dto: ReleaseDto = serde_json::from_str(json).unwrap();
        let demand = DemandSignal::from(dto);
        assert_eq!(demand, DemandSignal::new(412, 1203));
    }

    #[test]
    fn test_release_dto_blocked_without_community() {
        let dto: ReleaseDto = serde_json::from_str(r#"{"blocked_from_sale": true}"#).unwrap();
        let demand = DemandSignal::from(dto);
        assert!(demand.blocked_from_sale);
        assert_eq!(demand.want_count, 0);
        assert_eq!(demand.have_count, 0);
    }

    #[test]
    fn test_stats_dto_with_price() {
        let json = r#"{
            "lowest_price": {"currency": "USD", "value": 12.5},
            "num_for_sale": 7,
            "blocked_from_sale": false
        }"#;
        let dto: StatsDto = serde_json::from_str(json).unwrap();
        let signal = MarketplaceSignal::from(dto);
        assert_eq!(signal.active_listings, 7);
        assert_eq!(
            signal.lowest_price,
            Some(Price {
                value: 12.5,
                currency: "USD".to_string()
            })
        );
    }

    #[test]
    fn test_stats_dto_nothing_listed() {
        let json = r#"{"lowest_price": null, "num_for_sale": 0}"#;
        let dto: StatsDto = serde_json::from_str(json).unwrap();
        assert_eq!(MarketplaceSignal::from(dto), MarketplaceSignal::empty());
    }

    #[test]
    fn test_basic_information_to_item() {
        let json = r#"{
            "basic_information": {
                "id": 1867708,
                "title": "Blue Lines",
                "year": 1991,
                "artists": [{"name": "Massive Attack", "id": 3909}],
                "labels": [{"name": "Wild Bunch Records", "catno": "WBRLP 1"}],
                "formats": [{"name": "Vinyl", "qty": "1", "descriptions": ["LP", "Album"]}]
            }
        }"#;
        let dto: CollectionReleaseDto = serde_json::from_str(json).unwrap();
        let item = dto.basic_information.into_item("selling").unwrap();

        assert_eq!(item.release_id, 1867708);
        assert_eq!(item.folder, "selling");
        assert_eq!(item.artist.as_deref(), Some("Massive Attack"));
        assert_eq!(item.title.as_deref(), Some("Blue Lines"));
        assert_eq!(item.label.as_deref(), Some("Wild Bunch Records"));
        assert_eq!(item.catalog_number.as_deref(), Some("WBRLP 1"));
        assert_eq!(item.format.as_deref(), Some("Vinyl (LP, Album)"));
        assert_eq!(item.year, Some(1991));
    }

    #[test]
    fn test_basic_information_year_zero_is_unknown() {
        let json = r#"{"basic_information": {"id": 5, "year": 0}}"#;
        let dto: CollectionReleaseDto = serde_json::from_str(json).unwrap();
        let item = dto.basic_information.into_item("all").unwrap();
        assert_eq!(item.year, None);
        assert!(item.artist.is_none());
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("42"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(42)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
