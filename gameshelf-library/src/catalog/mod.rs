use std::time::Duration;

use log::error;
use reqwest::Client;
use thiserror::Error;

use crate::GameData;

mod rawg;
pub use rawg::PLACEHOLDER_IMAGE;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No RAWG API key is configured")]
    MissingKey,

    #[error("Failed to fetch from catalog: {0}")]
    FetchError(String),

    #[error("Catalog responded with {0}: {1}")]
    Status(u16, String),

    #[error("Failed to parse catalog response: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Applied to every outgoing request
    pub timeout: Duration,
}

impl CatalogConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.rawg.io/api";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// A game as listed by the external catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: u64,
    pub name: String,
    pub image_url: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    /// Whether the caller already has this game, only known for authenticated callers
    pub in_library: Option<bool>,
}

/// Paging and ordering for the explore listing. Missing values use the defaults.
#[derive(Debug, Clone, Default)]
pub struct ExploreQuery {
    pub ordering: Option<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
}

impl ExploreQuery {
    pub const DEFAULT_ORDERING: &'static str = "-relevance";
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 50;

    fn ordering(&self) -> &str {
        self.ordering
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(Self::DEFAULT_ORDERING)
    }

    fn page_size(&self) -> u32 {
        self.page_size
            .filter(|s| *s > 0)
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .min(Self::MAX_PAGE_SIZE)
    }

    fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }
}

/// Read-only access to the RAWG game catalog.
///
/// Failures never reach the caller. The listings fall back to a fixed set
/// of well known games and searching yields nothing.
pub struct Catalog {
    client: Client,
    config: CatalogConfig,
}

impl Catalog {
    const SEARCH_LIMIT: usize = 8;
    const POPULAR_FETCH_SIZE: u32 = 15;
    const POPULAR_LIMIT: usize = 10;

    pub fn new(config: CatalogConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub async fn search(&self, query: &str) -> Vec<CatalogEntry> {
        let params = [("search", query.trim().to_string())];

        match rawg::fetch_games(&self.client, &self.config, &params).await {
            Ok(games) => games
                .into_iter()
                .take(Self::SEARCH_LIMIT)
                .map(|g| g.into_entry())
                .collect(),
            Err(e) => {
                error!("Catalog search for \"{}\" failed: {}", query, e);
                vec![]
            }
        }
    }

    /// Highly rated games among the most relevant ones
    pub async fn popular(&self) -> Vec<CatalogEntry> {
        let params = [
            ("ordering", ExploreQuery::DEFAULT_ORDERING.to_string()),
            ("page_size", Self::POPULAR_FETCH_SIZE.to_string()),
        ];

        match rawg::fetch_games(&self.client, &self.config, &params).await {
            Ok(games) => games
                .into_iter()
                .filter(|g| g.is_acclaimed())
                .take(Self::POPULAR_LIMIT)
                .map(|g| g.into_entry())
                .collect(),
            Err(e) => {
                error!("Fetching popular games failed: {}", e);
                rawg::placeholders().into()
            }
        }
    }

    pub async fn explore(&self, query: ExploreQuery) -> Vec<CatalogEntry> {
        let ordering = query.ordering();
        let page_size = query.page_size();

        let params = [
            ("ordering", ordering.to_string()),
            ("page_size", page_size.to_string()),
            ("page", query.page().to_string()),
        ];

        match rawg::fetch_games(&self.client, &self.config, &params).await {
            Ok(games) => games
                .into_iter()
                .filter(|g| match ordering {
                    "-rating" => g.is_well_rated(),
                    _ => g.is_presentable(),
                })
                .take(page_size as usize)
                .map(|g| g.into_entry())
                .collect(),
            Err(e) => {
                error!("Fetching explore games failed: {}", e);
                rawg::placeholders().into_iter().take(1).collect()
            }
        }
    }
}

/// Flags the entries whose name matches a title in the given games, ignoring case
pub fn mark_owned(entries: &mut [CatalogEntry], games: &[GameData]) {
    let titles: Vec<_> = games.iter().map(|g| g.title.to_lowercase()).collect();

    for entry in entries {
        let name = entry.name.to_lowercase();
        entry.in_library = Some(titles.contains(&name));
    }
}
