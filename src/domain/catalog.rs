//! The persisted catalog database and per-run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use super::product::ProductRecord;

/// Run-level metadata stored alongside the product list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub total_products: usize,
    /// Distinct category labels in first-seen order.
    pub categories: Vec<String>,
}

/// The durable output of one pipeline run: metadata plus the ordered product
/// list with embedded resolved asset references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDatabase {
    pub metadata: RunMetadata,
    pub products: Vec<ProductRecord>,
}

impl CatalogDatabase {
    pub fn new(source: impl Into<String>, products: Vec<ProductRecord>) -> Self {
        let mut seen = HashSet::new();
        let categories = products
            .iter()
            .filter(|p| seen.insert(p.category.clone()))
            .map(|p| p.category.clone())
            .collect();
        Self {
            metadata: RunMetadata {
                source: source.into(),
                scraped_at: Utc::now(),
                total_products: products.len(),
                categories,
            },
            products,
        }
    }
}

/// Drop later records whose non-empty SKU repeats an earlier one. Records
/// with an empty SKU are always kept. Returns the surviving records and the
/// number dropped.
pub fn dedupe_by_sku(products: Vec<ProductRecord>) -> (Vec<ProductRecord>, usize) {
    let mut seen = HashSet::new();
    let before = products.len();
    let kept: Vec<ProductRecord> = products
        .into_iter()
        .filter(|p| p.sku.is_empty() || seen.insert(p.sku.clone()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Lightweight parallel index entry for fast lookups without loading the
/// full database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductIndexEntry {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub price: String,
    pub image_count: usize,
    pub download_count: usize,
}

impl From<&ProductRecord> for ProductIndexEntry {
    fn from(p: &ProductRecord) -> Self {
        Self {
            sku: p.sku.clone(),
            name: p.name.clone(),
            category: p.category.clone(),
            subcategory: p.subcategory.clone(),
            url: p.url.clone(),
            price: p.price.clone(),
            image_count: p.images.len(),
            download_count: p.downloads.len(),
        }
    }
}

/// Counters surfaced in the end-of-run summary. Failures are visible only
/// here and in the run log; nothing propagates past a single item.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub categories_crawled: usize,
    pub urls_discovered: usize,
    pub records_kept: usize,
    pub records_discarded: usize,
    pub sku_duplicates_dropped: usize,
    pub resolution_misses: usize,
    pub downloads_attempted: usize,
    pub downloads_succeeded: usize,
    pub downloads_skipped_existing: usize,
    pub downloads_failed: usize,
}

impl RunSummary {
    pub fn log(&self) {
        info!("run summary");
        info!("  categories crawled:     {}", self.categories_crawled);
        info!("  product urls found:     {}", self.urls_discovered);
        info!("  records kept:           {}", self.records_kept);
        info!("  records discarded:      {}", self.records_discarded);
        info!("  duplicate skus dropped: {}", self.sku_duplicates_dropped);
        info!("  resolution misses:      {}", self.resolution_misses);
        info!(
            "  downloads: {} attempted, {} ok, {} already valid, {} failed",
            self.downloads_attempted,
            self.downloads_succeeded,
            self.downloads_skipped_existing,
            self.downloads_failed
        );
    }
}
