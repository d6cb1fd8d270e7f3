//! Types for catalog items fetched from the external metadata service.

use serde::{Deserialize, Serialize};

/// Kind of media a catalog item describes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Episodic TV content. The only kind the dorama pipeline produces.
    #[default]
    Series,
    Movie,
}

/// A genre tag attached to a title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

impl Genre {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A metadata record for one title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    /// TMDB identifier.
    pub id: u32,
    /// Display name (localized when a language was requested).
    pub name: String,
    /// Name in the original language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// Poster path (relative to TMDB image base URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    /// Backdrop path (relative to TMDB image base URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    /// ISO-639-1 code of the original language.
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub genres: Vec<Genre>,
    /// Popularity score, used only for ranking.
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub media_kind: MediaKind,
}
