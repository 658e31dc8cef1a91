//! The catalog ingestion pipeline: link discovery, record extraction, asset
//! resolution against the downloads index, validated download, and the
//! standalone repair pass.

pub mod discovery;
pub mod downloader;
pub mod downloads_index;
pub mod extract;
pub mod heuristics;
pub mod repair;
pub mod resolver;

use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::{catalog, AssetReference, CatalogDatabase, ProductRecord, RunSummary};
use crate::infrastructure::{AppConfig, CatalogRepository, FetchPort};

use discovery::LinkDiscoverer;
use downloader::DownloadExecutor;
use downloads_index::DownloadsIndex;
use extract::RecordExtractor;
use repair::{RepairScanner, RepairSummary};

/// Sequencing of one full crawl run. Rendering and scraping are strictly
/// sequential over the shared fetch session; only the download phase runs
/// concurrently.
pub struct CatalogPipeline {
    cfg: AppConfig,
    fetcher: Arc<dyn FetchPort>,
}

impl CatalogPipeline {
    pub fn new(cfg: AppConfig, fetcher: Arc<dyn FetchPort>) -> Self {
        Self { cfg, fetcher }
    }

    /// Run the full pipeline to completion and persist the database.
    /// Individual item failures are logged and skipped; only an empty seed
    /// list or an empty downloads index aborts the run.
    pub async fn run(&self) -> Result<RunSummary> {
        if self.cfg.origin.category_paths.is_empty() {
            bail!("no category paths configured");
        }

        let mut summary = RunSummary::default();
        let delay = Duration::from_millis(self.cfg.crawl.request_delay_ms);

        // Phase 0: the downloads index, fetched exactly once, read-only
        // from here on.
        let index = DownloadsIndex::fetch(self.fetcher.as_ref(), &self.cfg.origin).await?;
        if index.is_empty() {
            bail!("downloads index is empty; check origin configuration");
        }

        // Phase 1: collect product URLs from every category.
        let discoverer =
            LinkDiscoverer::new(self.fetcher.as_ref(), &self.cfg.origin, &self.cfg.crawl);
        let links = discoverer.discover().await;
        summary.categories_crawled = self.cfg.origin.category_paths.len();
        summary.urls_discovered = links.len();

        // Phase 2: scrape each product page sequentially.
        let extractor = RecordExtractor::new()?;
        let mut products: Vec<ProductRecord> = Vec::new();
        for (idx, (url, category)) in links.iter().enumerate() {
            info!("[{}/{}] scraping {}", idx + 1, links.len(), url);
            match self.fetcher.render(url).await {
                Ok(html) => match extractor.extract(&html, url, category) {
                    Some(mut record) => {
                        self.resolve_downloads(&mut record, &index, &mut summary);
                        info!(
                            "added: {} ({}) - {} downloads",
                            record.name,
                            if record.sku.is_empty() { "no SKU" } else { record.sku.as_str() },
                            record.downloads.len()
                        );
                        products.push(record);
                    }
                    None => {
                        info!("discarded record without title: {}", url);
                        summary.records_discarded += 1;
                    }
                },
                Err(e) => {
                    warn!("error scraping product {}: {}", url, e);
                    summary.records_discarded += 1;
                }
            }
            sleep(delay).await;
        }

        let (mut products, sku_duplicates) = catalog::dedupe_by_sku(products);
        summary.sku_duplicates_dropped = sku_duplicates;
        summary.records_kept = products.len();

        // Phase 3: acquire assets concurrently.
        let executor = DownloadExecutor::new(
            Arc::clone(&self.fetcher),
            &self.cfg.download,
            &self.cfg.output.root_dir,
        );
        let stats = executor.run(&mut products).await;
        summary.downloads_attempted = stats.attempted;
        summary.downloads_succeeded = stats.downloaded;
        summary.downloads_skipped_existing = stats.skipped_existing;
        summary.downloads_failed = stats.failed;

        // Phase 4: persist the database and index documents.
        let db = CatalogDatabase::new(self.cfg.origin.base_url.clone(), products);
        CatalogRepository::new(&self.cfg.output.root_dir).save(&db).await?;

        summary.log();
        Ok(summary)
    }

    /// Attach the resolved asset manifest for one record. A miss leaves the
    /// record with an empty asset list; it is counted, not fatal.
    fn resolve_downloads(
        &self,
        record: &mut ProductRecord,
        index: &DownloadsIndex,
        summary: &mut RunSummary,
    ) {
        let key = heuristics::slugify(&record.name);
        match resolver::resolve(&key, index, self.cfg.matching.initial_token_threshold) {
            Some(entry) => {
                record.downloads = entry
                    .files
                    .iter()
                    .map(|f| AssetReference::resolved(f.kind, f.url.clone(), f.filename.clone()))
                    .collect();
            }
            None => {
                info!("no downloads matched for '{}'", record.name);
                summary.resolution_misses += 1;
            }
        }
    }

    /// Run the standalone repair pass over the persisted asset tree.
    pub async fn repair(&self, dry_run: bool) -> Result<RepairSummary> {
        let scanner = RepairScanner::new(self.fetcher.as_ref(), &self.cfg);
        scanner.run(&self.cfg.output.root_dir, dry_run).await
    }
}
