//! TMDB (The Movie Database) API client.
//!
//! TMDB requires an API key for access.
//! Rate limits are generous (around 40 requests per second), which is why the
//! harvester only bounds concurrency per group and never retries.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{CatalogItem, Genre, MediaKind};
use super::{ExternalCatalogError, SeriesCatalog};
use crate::metrics::{EXTERNAL_SERVICE_DURATION, EXTERNAL_SERVICE_REQUESTS};

/// TMDB API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    /// TMDB API key (required).
    pub api_key: String,
    /// Base URL (default: https://api.themoviedb.org/3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Language for localized names (e.g. "es-ES"). TMDB default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            language: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// TMDB API client.
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: Option<String>,
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(config: TmdbConfig) -> Result<Self, ExternalCatalogError> {
        if config.api_key.is_empty() {
            return Err(ExternalCatalogError::NotConfigured(
                "TMDB API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.themoviedb.org/3".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            language: config.language,
        })
    }

    /// Get a specific TV series by TMDB ID.
    pub async fn get_tv(&self, tmdb_id: u32) -> Result<CatalogItem, ExternalCatalogError> {
        let url = format!("{}/tv/{}", self.base_url, tmdb_id);

        debug!("TMDB get TV: id={}", tmdb_id);

        let mut request = self.client.get(&url).query(&[("api_key", &self.api_key)]);
        if let Some(language) = &self.language {
            request = request.query(&[("language", language)]);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == 404 {
            return Err(ExternalCatalogError::NotFound(format!(
                "TV series ID {}",
                tmdb_id
            )));
        }
        if status == 401 {
            return Err(ExternalCatalogError::NotConfigured(
                "Invalid TMDB API key".to_string(),
            ));
        }
        if status == 429 {
            return Err(ExternalCatalogError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalCatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let series: TmdbTvDetails = response.json().await.map_err(|e| {
            ExternalCatalogError::ParseError(format!("Failed to parse TV response: {}", e))
        })?;

        Ok(series.into())
    }
}

#[async_trait]
impl SeriesCatalog for TmdbClient {
    async fn fetch_detail(&self, id: u32) -> Result<CatalogItem, ExternalCatalogError> {
        let start = Instant::now();
        let result = self.get_tv(id).await;

        EXTERNAL_SERVICE_DURATION
            .with_label_values(&["tmdb", "get_tv"])
            .observe(start.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "success",
            Err(e) if e.is_not_found() => "not_found",
            Err(_) => "error",
        };
        EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["tmdb", "get_tv", status])
            .inc();

        result
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

// ============================================================================
// TMDB API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    id: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetails {
    id: u32,
    name: String,
    original_name: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    original_language: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    popularity: Option<f64>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<TmdbTvDetails> for CatalogItem {
    fn from(d: TmdbTvDetails) -> Self {
        Self {
            id: d.id,
            name: d.name,
            original_name: d.original_name,
            poster_path: d.poster_path,
            backdrop_path: d.backdrop_path,
            original_language: d.original_language.unwrap_or_default(),
            genres: d
                .genres
                .into_iter()
                .map(|g| Genre::new(g.id, g.name))
                .collect(),
            popularity: d.popularity.unwrap_or(0.0),
            media_kind: MediaKind::Series,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tv_details_conversion() {
        let details = TmdbTvDetails {
            id: 70523,
            name: "Crash Landing on You".to_string(),
            original_name: Some("사랑의 불시착".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
            backdrop_path: None,
            original_language: Some("ko".to_string()),
            genres: vec![
                TmdbGenre {
                    id: 18,
                    name: "Drama".to_string(),
                },
                TmdbGenre {
                    id: 35,
                    name: "Comedy".to_string(),
                },
            ],
            popularity: Some(120.25),
        };

        let item: CatalogItem = details.into();
        assert_eq!(item.id, 70523);
        assert_eq!(item.original_language, "ko");
        assert_eq!(item.genres.len(), 2);
        assert_eq!(item.genres[0], Genre::new(18, "Drama"));
        assert_eq!(item.popularity, 120.25);
        assert_eq!(item.media_kind, MediaKind::Series);
    }

    #[test]
    fn test_tv_details_missing_fields_default() {
        let json = r#"{"id": 1, "name": "Bare"}"#;
        let details: TmdbTvDetails = serde_json::from_str(json).unwrap();
        let item: CatalogItem = details.into();

        assert_eq!(item.original_language, "");
        assert!(item.genres.is_empty());
        assert_eq!(item.popularity, 0.0);
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = TmdbClient::new(TmdbConfig::default());
        assert!(matches!(result, Err(ExternalCatalogError::NotConfigured(_))));
    }

    #[test]
    fn test_new_trims_base_url() {
        let client = TmdbClient::new(TmdbConfig {
            api_key: "key".to_string(),
            base_url: Some("http://localhost:9999/3/".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.base_url, "http://localhost:9999/3");
    }
}
