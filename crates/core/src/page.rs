//! Paginated views over the accumulated result.

use serde::{Deserialize, Serialize};

use crate::external_catalog::CatalogItem;

/// One page of the accumulated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub items: Vec<CatalogItem>,
    /// Size of the whole accumulated list, not of this page.
    pub total: usize,
    /// 1-based page number actually served.
    pub page: usize,
    pub page_size: usize,
    /// The page was cut down for a caller without access.
    #[serde(default)]
    pub preview: bool,
}

impl Page {
    /// Number of pages needed for `total` items.
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    /// Restrict the page to the first `limit` items of the whole list and
    /// mark it as a preview. Pages starting at or past `limit` come back
    /// empty.
    pub fn preview(mut self, limit: usize) -> Self {
        let start = (self.page.max(1) - 1).saturating_mul(self.page_size);
        self.items.truncate(limit.saturating_sub(start));
        self.preview = true;
        self
    }
}

/// Slice page `n` (1-based; 0 is treated as 1) of `items`.
///
/// Pages past the end are empty rather than an error.
pub fn page_slice(items: &[CatalogItem], n: usize, page_size: usize) -> Page {
    let page = n.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    Page {
        items: items[start..end].to_vec(),
        total: items.len(),
        page,
        page_size,
        preview: false,
    }
}
