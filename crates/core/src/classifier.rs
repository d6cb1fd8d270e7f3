//! Korean drama classification heuristics.
//!
//! The rule is deliberately loose: it accepts false negatives (Korean series
//! tagged only as e.g. "Mystery") in exchange for never pulling in
//! non-Korean titles.

use crate::external_catalog::CatalogItem;

/// "Drama" in Korean, matched against the original-language name.
const KOREAN_DRAMA: &str = "드라마";

/// Genre substrings that mark a drama, matched case-insensitively.
const DRAMA_GENRE_MARKERS: [&str; 2] = ["drama", "dorama"];

/// Whether the item is a Korean drama.
///
/// `original_language == "ko"` AND (the original name contains "드라마" OR any
/// genre name contains "drama"/"dorama", case-insensitive).
pub fn is_korean_drama(item: &CatalogItem) -> bool {
    if item.original_language != "ko" {
        return false;
    }

    let name_matches = item
        .original_name
        .as_deref()
        .is_some_and(|name| name.contains(KOREAN_DRAMA));

    name_matches
        || item.genres.iter().any(|genre| {
            let name = genre.name.to_lowercase();
            DRAMA_GENRE_MARKERS
                .iter()
                .any(|marker| name.contains(marker))
        })
}

/// Whether the item has at least one usable artwork reference.
pub fn has_artwork(item: &CatalogItem) -> bool {
    let present = |path: &Option<String>| path.as_deref().is_some_and(|p| !p.trim().is_empty());
    present(&item.poster_path) || present(&item.backdrop_path)
}

/// Reason an item was rejected, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotKoreanDrama,
    NoArtwork,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::NotKoreanDrama => "not_korean_drama",
            Rejection::NoArtwork => "no_artwork",
        }
    }
}

/// Full admission check applied by the harvester.
pub fn qualifies(item: &CatalogItem) -> Result<(), Rejection> {
    if !is_korean_drama(item) {
        return Err(Rejection::NotKoreanDrama);
    }
    if !has_artwork(item) {
        return Err(Rejection::NoArtwork);
    }
    Ok(())
}
