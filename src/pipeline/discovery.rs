//! Link discovery: walk the fixed category list and collect candidate
//! product page URLs, first-seen category wins.

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::infrastructure::config::{CrawlConfig, OriginConfig};
use crate::infrastructure::fetch::FetchPort;
use crate::infrastructure::errors::FetchError;

use super::heuristics;

/// Product URLs mapped to the category label they were first seen under,
/// in discovery order.
#[derive(Debug, Default)]
pub struct DiscoveredLinks {
    entries: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl DiscoveredLinks {
    /// First-seen wins: a URL already attributed to a category is not
    /// reassigned.
    pub fn insert(&mut self, url: String, category: &str) {
        if self.seen.insert(url.clone()) {
            self.entries.push((url, category.to_string()));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(u, c)| (u.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walks category listing pages and extracts product links.
pub struct LinkDiscoverer<'a> {
    fetcher: &'a dyn FetchPort,
    origin: &'a OriginConfig,
    delay: Duration,
}

impl<'a> LinkDiscoverer<'a> {
    pub fn new(fetcher: &'a dyn FetchPort, origin: &'a OriginConfig, crawl: &CrawlConfig) -> Self {
        Self {
            fetcher,
            origin,
            delay: Duration::from_millis(crawl.request_delay_ms),
        }
    }

    /// Crawl every configured category. A failure on one category is logged
    /// and skipped; it never aborts the run.
    pub async fn discover(&self) -> DiscoveredLinks {
        let mut links = DiscoveredLinks::default();
        for category_path in &self.origin.category_paths {
            let label = category_label(category_path);
            match self.collect_category(category_path).await {
                Ok(found) => {
                    info!("category {}: {} candidate links", label, found.len());
                    for url in found {
                        links.insert(url, &label);
                    }
                }
                Err(e) if e.is_timeout() => {
                    warn!("timeout on category {}: {}", category_path, e);
                }
                Err(e) => {
                    warn!("error on category {}: {}", category_path, e);
                }
            }
            sleep(self.delay).await;
        }
        info!("discovered {} unique product urls", links.len());
        links
    }

    async fn collect_category(&self, category_path: &str) -> Result<Vec<String>, FetchError> {
        let listing_url = format!(
            "{}{}",
            self.origin.base_url.trim_end_matches('/'),
            category_path
        );
        info!("crawling category: {}", category_path);
        let html = self.fetcher.render(&listing_url).await?;
        Ok(extract_product_links(&html, &self.origin.base_url))
    }
}

/// Category label from the last path segment: `.../retractable` becomes
/// `Retractable`.
pub fn category_label(category_path: &str) -> String {
    let segment = category_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(category_path);
    heuristics::title_case_segment(segment)
}

/// Extract anchors accepted as product links: same origin, not a known
/// non-product path, at least one segment, no trailing separator, long
/// enough to carry a slug. Document order is preserved.
pub fn extract_product_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        warn!("invalid base url: {}", base_url);
        return Vec::new();
    };
    let anchor = Selector::parse("a[href]").expect("static selector");

    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in doc.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.host_str() != base.host_str() {
            continue;
        }
        if !heuristics::is_product_path(resolved.path()) {
            continue;
        }
        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}
