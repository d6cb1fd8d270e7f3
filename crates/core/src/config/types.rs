use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::external_catalog::TmdbConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration.
///
/// A caller that authenticates successfully has full access to the catalog;
/// everyone else gets preview pages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Persistent cache tier storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Byte limit across all stored values. 0 means unlimited.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
}

impl StorageConfig {
    pub fn quota(&self) -> Option<usize> {
        (self.quota_bytes > 0).then_some(self.quota_bytes)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("dorama.db")
}

fn default_quota_bytes() -> usize {
    5 * 1024 * 1024
}

/// Harvest pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvestConfig {
    /// Candidate ids fetched concurrently per group.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Items per page served to clients.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Maximum items written to the persistent cache tier.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    /// Cache entries at least this old trigger a fresh harvest.
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: u32,
    /// Persistent storage key for the cache entry.
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    /// Inline candidate ids. Ignored when `candidates_file` is set.
    #[serde(default)]
    pub candidates: Vec<u32>,
    /// File with candidate ids (JSON array or one id per line).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_file: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            max_cache_size: default_max_cache_size(),
            staleness_hours: default_staleness_hours(),
            cache_key: default_cache_key(),
            candidates: Vec::new(),
            candidates_file: None,
        }
    }
}

fn default_batch_size() -> usize {
    20
}

fn default_page_size() -> usize {
    20
}

fn default_max_cache_size() -> usize {
    500
}

fn default_staleness_hours() -> u32 {
    24
}

fn default_cache_key() -> String {
    "dorama_cache_v1".to_string()
}

/// Preview limits for callers without access.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessConfig {
    #[serde(default = "default_preview_items")]
    pub preview_items: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            preview_items: default_preview_items(),
        }
    }
}

fn default_preview_items() -> usize {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub tmdb: SanitizedTmdbConfig,
    pub storage: StorageConfig,
    pub harvest: SanitizedHarvestConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
}

/// Sanitized TMDB config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTmdbConfig {
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub timeout_secs: u32,
}

/// Harvest config without the inline candidate list
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHarvestConfig {
    pub batch_size: usize,
    pub page_size: usize,
    pub max_cache_size: usize,
    pub staleness_hours: u32,
    pub cache_key: String,
    pub inline_candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_file: Option<PathBuf>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
            },
            server: config.server.clone(),
            tmdb: SanitizedTmdbConfig {
                api_key_configured: !config.tmdb.api_key.is_empty(),
                base_url: config.tmdb.base_url.clone(),
                language: config.tmdb.language.clone(),
                timeout_secs: config.tmdb.timeout_secs,
            },
            storage: config.storage.clone(),
            harvest: SanitizedHarvestConfig {
                batch_size: config.harvest.batch_size,
                page_size: config.harvest.page_size,
                max_cache_size: config.harvest.max_cache_size,
                staleness_hours: config.harvest.staleness_hours,
                cache_key: config.harvest.cache_key.clone(),
                inline_candidates: config.harvest.candidates.len(),
                candidates_file: config.harvest.candidates_file.clone(),
            },
            access: config.access.clone(),
        }
    }
}
