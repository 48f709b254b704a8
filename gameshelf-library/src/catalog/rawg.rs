use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{CatalogConfig, CatalogEntry, CatalogError};

/// Shown when RAWG has no artwork for a game
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/400x500.png?text=No+Image";

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Page {
    results: Vec<Game>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct Game {
    pub id: u64,
    pub name: Option<String>,
    pub background_image: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub metacritic: Option<u32>,
    pub genres: Option<Vec<Genre>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct Genre {
    pub name: String,
}

impl Game {
    fn rating_or_zero(&self) -> f64 {
        self.rating.unwrap_or_default()
    }

    fn metacritic_or_zero(&self) -> u32 {
        self.metacritic.unwrap_or_default()
    }

    fn has_image(&self) -> bool {
        self.background_image
            .as_deref()
            .is_some_and(|i| i.starts_with("http"))
    }

    fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Kept by the popular listing
    pub fn is_acclaimed(&self) -> bool {
        self.rating_or_zero() >= 4.0 && self.metacritic_or_zero() >= 60
    }

    /// Kept by every explore listing
    pub fn is_presentable(&self) -> bool {
        self.has_image() && self.has_name()
    }

    /// Kept by the explore listing when ordered by rating
    pub fn is_well_rated(&self) -> bool {
        self.is_presentable() && self.rating_or_zero() >= 3.5 && self.metacritic_or_zero() >= 50
    }

    pub fn into_entry(self) -> CatalogEntry {
        let image_url = self
            .background_image
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());

        CatalogEntry {
            id: self.id,
            name: self.name.unwrap_or_default(),
            image_url,
            description: self.description.filter(|d| !d.is_empty()),
            // RAWG reports 0 for unrated games
            rating: self.rating.filter(|r| *r > 0.0),
            genres: self
                .genres
                .unwrap_or_default()
                .into_iter()
                .map(|g| g.name)
                .collect(),
            in_library: None,
        }
    }
}

/// Fetches one page of the games listing with the given query parameters
pub(super) async fn fetch_games(
    client: &Client,
    config: &CatalogConfig,
    params: &[(&str, String)],
) -> Result<Vec<Game>, CatalogError> {
    let key = config.api_key.as_deref().ok_or(CatalogError::MissingKey)?;
    let url = format!("{}/games", config.base_url.trim_end_matches('/'));

    let response = client
        .get(url)
        .query(&[("key", key)])
        .query(params)
        .timeout(config.timeout)
        .send()
        .await
        .map_err(|e| CatalogError::FetchError(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(handle_unsuccessful_request(response, status).await);
    }

    let page: Page = response
        .json()
        .await
        .map_err(|e| CatalogError::ParseError(e.to_string()))?;

    Ok(page.results)
}

async fn handle_unsuccessful_request(response: Response, status: StatusCode) -> CatalogError {
    let result = response.text().await;

    match result {
        Ok(text) => CatalogError::Status(status.as_u16(), text),
        Err(e) => CatalogError::Status(status.as_u16(), e.to_string()),
    }
}

/// The fixed entries served when RAWG can't be reached
pub(super) fn placeholders() -> [CatalogEntry; 2] {
    [
        CatalogEntry {
            id: 3498,
            name: "Grand Theft Auto V".to_string(),
            image_url: "https://media.rawg.io/media/games/20a/20aa03ad8601e7f42a6050e3f51d3f6f.jpg"
                .to_string(),
            description: Some(
                "An action-adventure game set in the fictional state of San Andreas.".to_string(),
            ),
            rating: Some(4.5),
            genres: vec!["Action".to_string(), "Adventure".to_string()],
            in_library: None,
        },
        CatalogEntry {
            id: 3328,
            name: "The Witcher 3: Wild Hunt".to_string(),
            image_url: "https://media.rawg.io/media/games/618/618c2031a07bbff6b4f611f10b6bcdbc.jpg"
                .to_string(),
            description: Some(
                "As Geralt of Rivia, a professional monster hunter, track down the child of prophecy."
                    .to_string(),
            ),
            rating: Some(4.6),
            genres: vec!["RPG".to_string(), "Adventure".to_string()],
            in_library: None,
        },
    ]
}
