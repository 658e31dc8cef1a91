//! Repair scanner: an independent pass over an already-persisted asset tree.
//!
//! Finds document files whose bytes are really soft-error HTML, re-derives
//! the product identity from the filename, re-resolves it against a freshly
//! fetched downloads index with the permissive threshold, and re-downloads
//! the role-consistent candidate in place.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::fetch::FetchPort;

use super::downloader::fetch_and_store;
use super::downloads_index::DownloadsIndex;
use super::heuristics::{
    self, candidate_matches_role, header_is_broken, product_name_from_stem, role_for_stem,
};
use super::resolver;

/// Counters for one repair pass.
#[derive(Debug, Default, Clone)]
pub struct RepairSummary {
    pub scanned: usize,
    pub broken: usize,
    pub repaired: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RepairSummary {
    pub fn log(&self) {
        info!("repair summary");
        info!("  files scanned: {}", self.scanned);
        info!("  broken:        {}", self.broken);
        info!("  repaired:      {}", self.repaired);
        info!("  skipped:       {}", self.skipped);
        info!("  failed:        {}", self.failed);
    }
}

pub struct RepairScanner<'a> {
    fetcher: &'a dyn FetchPort,
    cfg: &'a AppConfig,
}

impl<'a> RepairScanner<'a> {
    pub fn new(fetcher: &'a dyn FetchPort, cfg: &'a AppConfig) -> Self {
        Self { fetcher, cfg }
    }

    /// Scan `root` for broken documents and repair them in place. With
    /// `dry_run`, report what would be repaired without downloading.
    pub async fn run(&self, root: &Path, dry_run: bool) -> Result<RepairSummary> {
        if !root.exists() {
            bail!("asset tree not found: {}", root.display());
        }

        let mut summary = RepairSummary::default();
        let documents = collect_documents(root)?;
        summary.scanned = documents.len();

        let broken: Vec<PathBuf> = documents
            .into_iter()
            .filter(|p| file_is_broken(p))
            .collect();
        summary.broken = broken.len();
        info!("found {} broken document files", summary.broken);
        if broken.is_empty() {
            return Ok(summary);
        }

        let index = DownloadsIndex::fetch(self.fetcher, &self.cfg.origin).await?;
        if index.is_empty() {
            bail!("downloads index is empty; cannot resolve repair sources");
        }

        let threshold = self.cfg.matching.repair_token_threshold;
        let throttle = Duration::from_millis(self.cfg.download.throttle_ms);
        for path in broken {
            self.repair_one(&path, &index, threshold, dry_run, &mut summary)
                .await;
            sleep(throttle).await;
        }
        summary.log();
        Ok(summary)
    }

    async fn repair_one(
        &self,
        path: &Path,
        index: &DownloadsIndex,
        threshold: usize,
        dry_run: bool,
        summary: &mut RepairSummary,
    ) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let product_name = product_name_from_stem(&stem);
        let product_key = heuristics::slugify(&product_name);

        let Some(entry) = resolver::resolve(&product_key, index, threshold) else {
            info!("skipped {}: no index match for '{}'", display_name(path), product_name);
            summary.skipped += 1;
            return;
        };

        let role = role_for_stem(&stem);
        let Some(candidate) = entry
            .files
            .iter()
            .find(|f| candidate_matches_role(role, &f.filename, &f.link_text))
        else {
            info!(
                "skipped {}: no role-consistent candidate among {} files of '{}'",
                display_name(path),
                entry.files.len(),
                entry.display_name
            );
            summary.skipped += 1;
            return;
        };

        info!("repairing {} from {}", display_name(path), candidate.url);
        if dry_run {
            info!("dry run: would redownload {}", display_name(path));
            summary.repaired += 1;
            return;
        }

        match fetch_and_store(self.fetcher, &candidate.url, path).await {
            Ok(()) => summary.repaired += 1,
            Err(e) => {
                warn!("repair failed for {}: {:#}", display_name(path), e);
                summary.failed += 1;
            }
        }
    }
}

/// Every persisted document-type file under the root, sorted for a stable
/// repair order.
fn collect_documents(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, &mut files)
        .with_context(|| format!("failed to scan asset tree {}", root.display()))?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, files)?;
        } else if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        {
            files.push(path);
        }
    }
    Ok(())
}

/// A file is broken when its leading bytes carry an HTML signature, or its
/// extension implies a magic signature that is absent. Unreadable files are
/// left alone.
fn file_is_broken(path: &Path) -> bool {
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    let mut head = vec![0u8; heuristics::SNIFF_LEN];
    let Ok(n) = file.read(&mut head) else {
        return false;
    };
    head.truncate(n);
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    header_is_broken(&head, ext.as_deref())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::errors::FetchError;
    use crate::infrastructure::fetch::FetchedBody;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const ASSET_HOST: &str = "s3cdn.theexhibitorshandbook.com";

    /// Serves the downloads hub as HTML and asset bodies as bytes.
    struct HubFetcher {
        hub_html: String,
        bodies: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl FetchPort for HubFetcher {
        async fn render(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.hub_html.clone())
        }

        async fn fetch_bytes(&self, url: &str) -> Result<FetchedBody, FetchError> {
            match self.bodies.get(url) {
                Some(body) => Ok(FetchedBody {
                    status: 200,
                    body: body.clone(),
                }),
                None => Ok(FetchedBody {
                    status: 404,
                    body: Vec::new(),
                }),
            }
        }
    }

    fn hub_fetcher() -> HubFetcher {
        let gt_url = format!("https://{ASSET_HOST}/GraphicTemplates/GT_banner_stand.pdf");
        let is_url = format!("https://{ASSET_HOST}/InstructionSheets/IS_banner_stand.pdf");
        let hub_html = format!(
            r#"<table><tr>
               <td class="name">Retractable Banner Stand</td>
               <td>
                 <a href="{gt_url}">Graphic template</a>
                 <a href="{is_url}">Instruction sheet</a>
               </td>
            </tr></table>"#
        );
        let mut bodies = HashMap::new();
        bodies.insert(gt_url, b"%PDF-1.4 graphic template".to_vec());
        bodies.insert(is_url, b"%PDF-1.4 instruction sheet".to_vec());
        HubFetcher { hub_html, bodies }
    }

    fn write_broken(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, b"<!doctype html><html>Not found</html>").expect("write");
        path
    }

    #[tokio::test]
    async fn broken_template_is_repaired_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_broken(
            dir.path(),
            "templates/retractable/retractable_banner_stand_graphic_templates.pdf",
        );

        let fetcher = hub_fetcher();
        let cfg = AppConfig::default();
        let scanner = RepairScanner::new(&fetcher, &cfg);
        let summary = scanner.run(dir.path(), false).await.expect("repair run");

        assert_eq!(summary.broken, 1);
        assert_eq!(summary.repaired, 1);
        assert_eq!(summary.failed, 0);
        let repaired = fs::read(&path).expect("read repaired");
        assert!(repaired.starts_with(b"%PDF"));
        assert!(String::from_utf8_lossy(&repaired).contains("graphic template"));
    }

    #[tokio::test]
    async fn valid_pdf_is_never_flagged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("brochures/retractable/stand.pdf");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, b"%PDF-1.4 fine").expect("write");

        let fetcher = hub_fetcher();
        let cfg = AppConfig::default();
        let scanner = RepairScanner::new(&fetcher, &cfg);
        let summary = scanner.run(dir.path(), false).await.expect("repair run");

        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.broken, 0);
        assert_eq!(summary.repaired, 0);
    }

    #[tokio::test]
    async fn dry_run_reports_but_leaves_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_broken(
            dir.path(),
            "templates/retractable/retractable_banner_stand_graphic_templates.pdf",
        );

        let fetcher = hub_fetcher();
        let cfg = AppConfig::default();
        let scanner = RepairScanner::new(&fetcher, &cfg);
        let summary = scanner.run(dir.path(), true).await.expect("repair run");

        assert_eq!(summary.repaired, 1);
        let untouched = fs::read(&path).expect("read");
        assert!(untouched.starts_with(b"<!doctype"));
    }

    #[tokio::test]
    async fn unmatched_product_is_skipped_not_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_broken(
            dir.path(),
            "brochures/other/unknown_gadget_thing_downloadable_resources.pdf",
        );

        let fetcher = hub_fetcher();
        let cfg = AppConfig::default();
        let scanner = RepairScanner::new(&fetcher, &cfg);
        let summary = scanner.run(dir.path(), false).await.expect("repair run");

        assert_eq!(summary.broken, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }
}
