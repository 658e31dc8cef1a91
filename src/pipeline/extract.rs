//! Record extraction from a rendered product page.
//!
//! Extraction is best-effort and tolerant: a missing or empty title discards
//! the whole record; every other field independently degrades to an empty
//! default. Downloadable assets are not read from the page; the downloads
//! index is the single source of truth for those.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{AssetKind, AssetReference, ProductRecord};

use super::heuristics;

/// Hard limits bounding record size.
const MAX_DESCRIPTION_CHARS: usize = 1000;
const MAX_IMAGES_PER_PRODUCT: usize = 20;
const MIN_NAME_CHARS: usize = 2;

const SKU_LABEL_PREFIXES: &[&str] = &["SKU:", "Item #:"];

/// Parser for product detail pages, with fallback selector chains compiled
/// once up front.
pub struct RecordExtractor {
    name_selectors: Vec<Selector>,
    sku_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    description_selectors: Vec<Selector>,
    image_selector: Selector,
    row_selector: Selector,
    cell_selector: Selector,
}

impl RecordExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            name_selectors: compile_selectors(&[
                "h1[class*='product-title']",
                "h1[class*='page-title']",
                "h1",
            ])?,
            sku_selectors: compile_selectors(&[
                "[class*='sku']",
                "div[itemprop='sku']",
                "span[itemprop='sku']",
            ])?,
            price_selectors: compile_selectors(&["[class*='price']", "[itemprop='price']"])?,
            description_selectors: compile_selectors(&[
                "[class*='product-description']",
                "[class*='description']",
                "div[itemprop='description']",
            ])?,
            image_selector: parse_selector("img")?,
            row_selector: parse_selector("tr")?,
            cell_selector: parse_selector("th, td")?,
        })
    }

    /// Extract a record from the rendered HTML of one product page.
    /// Returns `None` when no valid title is present.
    pub fn extract(&self, html: &str, product_url: &str, category: &str) -> Option<ProductRecord> {
        let doc = Html::parse_document(html);

        let name = first_text(&doc, &self.name_selectors)?;
        if name.chars().count() < MIN_NAME_CHARS {
            debug!("discarding record with too-short title at {}", product_url);
            return None;
        }

        let mut record = ProductRecord::new(name, product_url, category);

        if let Some(sku) = first_text(&doc, &self.sku_selectors) {
            record.sku = strip_sku_labels(&sku);
        }
        if let Some(price) = first_text(&doc, &self.price_selectors) {
            record.price = price;
        }
        if let Some(description) = first_text(&doc, &self.description_selectors) {
            record.description = truncate_chars(&description, MAX_DESCRIPTION_CHARS);
        }

        record.images = self.extract_images(&doc, product_url);
        self.extract_attributes(&doc, &mut record);
        record.subcategory = derive_subcategory(product_url, category);

        Some(record)
    }

    /// Every accepted image element, resize segments stripped, deduplicated
    /// by resolved URL, capped.
    fn extract_images(&self, doc: &Html, product_url: &str) -> Vec<AssetReference> {
        let base = match Url::parse(product_url) {
            Ok(u) => u,
            Err(e) => {
                warn!("unparseable product url {}: {}", product_url, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut images = Vec::new();
        for element in doc.select(&self.image_selector) {
            let src = element
                .value()
                .attr("data-src")
                .or_else(|| element.value().attr("src"))
                .unwrap_or_default();
            if src.is_empty() {
                continue;
            }
            if heuristics::EXCLUDED_IMAGE_MARKERS.iter().any(|m| src.contains(m)) {
                continue;
            }
            let lowered = src.to_lowercase();
            if !heuristics::IMAGE_EXTENSIONS.iter().any(|ext| lowered.contains(ext)) {
                continue;
            }
            let Ok(resolved) = base.join(src) else {
                continue;
            };
            let clean = heuristics::strip_resize_segments(resolved.as_str());
            if !seen.insert(clean.clone()) {
                continue;
            }
            let filename = last_path_segment(&clean);
            images.push(AssetReference::resolved(AssetKind::Image, clean, filename));
            if images.len() >= MAX_IMAGES_PER_PRODUCT {
                break;
            }
        }
        images
    }

    /// Capture every two-cell table row as a key/value attribute.
    fn extract_attributes(&self, doc: &Html, record: &mut ProductRecord) {
        for row in doc.select(&self.row_selector) {
            let cells: Vec<ElementRef> = row.select(&self.cell_selector).collect();
            if cells.len() != 2 {
                continue;
            }
            let key = cell_text(&cells[0]);
            let value = cell_text(&cells[1]);
            if !key.is_empty() && !value.is_empty() {
                record.push_attribute(key, value);
            }
        }
    }
}

fn compile_selectors(selector_strings: &[&str]) -> Result<Vec<Selector>> {
    let mut selectors = Vec::new();
    for s in selector_strings {
        match Selector::parse(s) {
            Ok(sel) => selectors.push(sel),
            Err(e) => warn!("failed to compile selector '{}': {}", s, e),
        }
    }
    if selectors.is_empty() {
        anyhow::bail!("no valid selectors compiled from {:?}", selector_strings);
    }
    Ok(selectors)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("invalid selector '{}': {}", s, e))
}

/// First non-empty text match across a fallback selector chain.
fn first_text(doc: &Html, selectors: &[Selector]) -> Option<String> {
    for selector in selectors {
        if let Some(element) = doc.select(selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn cell_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn strip_sku_labels(raw: &str) -> String {
    let mut sku = raw.to_string();
    for prefix in SKU_LABEL_PREFIXES {
        sku = sku.replace(prefix, "");
    }
    sku.trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn last_path_segment(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Subcategory from the URL path segments between the site root and the
/// page's own segment, title-cased and joined; falls back to the category
/// label when the path is too shallow.
fn derive_subcategory(product_url: &str, category: &str) -> String {
    let Ok(url) = Url::parse(product_url) else {
        return category.to_string();
    };
    let parts: Vec<&str> = url.path().trim_matches('/').split('/').collect();
    if parts.len() > 2 {
        parts[1..parts.len() - 1]
            .iter()
            .map(|p| heuristics::title_case_segment(p))
            .collect::<Vec<_>>()
            .join(" > ")
    } else {
        category.to_string()
    }
}
