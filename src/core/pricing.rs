//! Print pricing.
//!
//! A total is the sum of stationery prices plus every document page multiplied by
//! the per-page rate and the number of copies. The same price sheet is used by the
//! cart for the live total and by the server to validate a submitted total.

use crate::core::cart::{FileItem, PrintSettings};
use serde::{Deserialize, Serialize};

/// Per-page rates in currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSheet {
    /// Rate for a color page
    pub color_per_page: i64,
    /// Rate for a black & white page
    pub black_white_per_page: i64,
}

impl Default for PriceSheet {
    fn default() -> Self {
        Self {
            color_per_page: 10,
            black_white_per_page: 2,
        }
    }
}

impl PriceSheet {
    /// Rate applied to each document page.
    #[must_use]
    pub const fn per_page_rate(&self, color: bool) -> i64 {
        if color {
            self.color_per_page
        } else {
            self.black_white_per_page
        }
    }

    /// Prices a set of items under one group of print settings.
    ///
    /// Documents whose page count is still 0 contribute nothing, so the result is
    /// provisional until every count has been resolved.
    #[must_use]
    pub fn total_for(&self, items: &[FileItem], settings: &PrintSettings) -> i64 {
        let stationery: i64 = items
            .iter()
            .filter_map(FileItem::price)
            .fold(0, i64::saturating_add);

        let pages: i64 = items
            .iter()
            .filter(|item| !item.is_stationery())
            .map(|item| i64::from(item.page_count))
            .fold(0, i64::saturating_add);

        let printing = pages
            .saturating_mul(self.per_page_rate(settings.color))
            .saturating_mul(i64::from(settings.copies));

        stationery.saturating_add(printing)
    }
}
