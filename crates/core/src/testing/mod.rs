//! Testing utilities and mock implementations.
//!
//! Mocks for the remote catalog and the persistent key-value store, so the
//! harvest pipeline can be exercised end to end without network or disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use dorama_core::testing::{fixtures, MemoryKeyValueStore, MockSeriesCatalog};
//!
//! let catalog = MockSeriesCatalog::with_items(vec![
//!     fixtures::korean_drama(1, 80.0),
//!     fixtures::western_drama(2, 95.0),
//! ]);
//! let store = MemoryKeyValueStore::with_quota(4096);
//! ```

mod memory_store;
mod mock_series_catalog;

pub use memory_store::MemoryKeyValueStore;
pub use mock_series_catalog::MockSeriesCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::external_catalog::{CatalogItem, Genre, MediaKind};

    /// A Korean drama that passes classification.
    pub fn korean_drama(id: u32, popularity: f64) -> CatalogItem {
        CatalogItem {
            id,
            name: format!("Korean Drama {}", id),
            original_name: Some(format!("한국 드라마 {}", id)),
            poster_path: Some(format!("/poster-{}.jpg", id)),
            backdrop_path: Some(format!("/backdrop-{}.jpg", id)),
            original_language: "ko".to_string(),
            genres: vec![Genre::new(18, "Drama")],
            popularity,
            media_kind: MediaKind::Series,
        }
    }

    /// A Korean series that is not a drama (variety show).
    pub fn korean_variety(id: u32, popularity: f64) -> CatalogItem {
        CatalogItem {
            original_name: Some(format!("예능 {}", id)),
            genres: vec![Genre::new(10764, "Reality")],
            ..korean_drama(id, popularity)
        }
    }

    /// A drama in a language other than Korean.
    pub fn western_drama(id: u32, popularity: f64) -> CatalogItem {
        CatalogItem {
            original_name: Some(format!("Western Drama {}", id)),
            original_language: "en".to_string(),
            ..korean_drama(id, popularity)
        }
    }

    /// A Korean drama with no artwork at all.
    pub fn korean_drama_without_artwork(id: u32, popularity: f64) -> CatalogItem {
        CatalogItem {
            poster_path: None,
            backdrop_path: None,
            ..korean_drama(id, popularity)
        }
    }
}
