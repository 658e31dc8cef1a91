//! Download executor: fetch every resolved asset reference, validate the
//! body against its expected format, and persist it under the
//! category-partitioned archive tree. Idempotent across re-runs.

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::{AssetReference, ProductRecord};
use crate::infrastructure::config::DownloadConfig;
use crate::infrastructure::errors::ContentError;
use crate::infrastructure::fetch::FetchPort;

use super::heuristics;

/// Outcome counters for one executor batch.
#[derive(Debug, Default, Clone)]
pub struct DownloadStats {
    pub attempted: usize,
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Which asset slot on which product a task reports back to.
#[derive(Debug, Clone, Copy)]
enum AssetSlot {
    Image(usize, usize),
    Download(usize, usize),
}

struct DownloadTask {
    url: String,
    dest: PathBuf,
    slot: AssetSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Fetched, validated, and written.
    Downloaded,
    /// Destination already existed and passed validation; no network call.
    AlreadyValid,
    Failed,
}

/// Fetches resolved asset references concurrently under a fixed in-flight
/// cap, one transfer per destination path.
pub struct DownloadExecutor<'a> {
    fetcher: Arc<dyn FetchPort>,
    cfg: &'a DownloadConfig,
    root: &'a Path,
}

impl<'a> DownloadExecutor<'a> {
    pub fn new(fetcher: Arc<dyn FetchPort>, cfg: &'a DownloadConfig, root: &'a Path) -> Self {
        Self { fetcher, cfg, root }
    }

    /// Download every scheduled asset for the given records, marking each
    /// reference downloaded or failed in place. Per-asset failures never
    /// abort the batch.
    pub async fn run(&self, products: &mut [ProductRecord]) -> DownloadStats {
        let (tasks, aliases) = self.plan(products);
        info!("{} files to download", tasks.len());

        let semaphore = Arc::new(Semaphore::new(self.cfg.max_concurrent.max(1)));
        let throttle = Duration::from_millis(self.cfg.throttle_ms);

        let mut handles = Vec::with_capacity(tasks.len());
        let mut slots = Vec::with_capacity(tasks.len());
        let mut dests = Vec::with_capacity(tasks.len());
        for task in tasks {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let url = task.url;
            let dest = task.dest.clone();
            slots.push(task.slot);
            dests.push(task.dest);
            handles.push(tokio::spawn(async move {
                // Permit is held for the whole transfer; the semaphore is
                // the in-flight cap.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("download semaphore closed");
                fetch_one(fetcher.as_ref(), &url, &dest).await
            }));
            // Politeness spacing between transfer starts.
            sleep(throttle).await;
        }

        let mut stats = DownloadStats::default();
        let mut by_dest: HashMap<PathBuf, Outcome> = HashMap::new();
        let results = join_all(handles).await;
        for ((result, slot), dest) in results.into_iter().zip(slots).zip(dests) {
            stats.attempted += 1;
            let outcome = match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!("download failed for {}: {:#}", dest.display(), e);
                    Outcome::Failed
                }
                Err(e) => {
                    warn!("download task panicked for {}: {}", dest.display(), e);
                    Outcome::Failed
                }
            };
            self.apply_outcome(products, slot, &dest, outcome, &mut stats);
            by_dest.insert(dest, outcome);
        }

        // References deduplicated out of the task list share the outcome of
        // the transfer that owned their destination.
        for (slot, dest) in aliases {
            if let Some(&outcome) = by_dest.get(&dest) {
                self.apply_outcome(products, slot, &dest, outcome, &mut stats);
            }
        }
        info!(
            "downloads: {} ok, {} already valid, {} failed",
            stats.downloaded, stats.skipped_existing, stats.failed
        );
        stats
    }

    /// Build the task list: destination paths composed from asset kind,
    /// category slug, product slug, and the suggested filename. Duplicate
    /// destinations collapse to one task so no two transfers ever target
    /// the same path.
    fn plan(&self, products: &[ProductRecord]) -> (Vec<DownloadTask>, Vec<(AssetSlot, PathBuf)>) {
        let mut tasks: Vec<DownloadTask> = Vec::new();
        let mut owned: HashSet<PathBuf> = HashSet::new();
        let mut aliases = Vec::new();

        for (pi, product) in products.iter().enumerate() {
            let product_slug = product_slug(product);
            let category_slug = heuristics::slugify(&product.category);

            let image_count = product.images.len().min(self.cfg.max_images_per_product);
            let scheduled = product.images[..image_count]
                .iter()
                .enumerate()
                .map(|(ai, asset)| (AssetSlot::Image(pi, ai), asset))
                .chain(
                    product
                        .downloads
                        .iter()
                        .enumerate()
                        .map(|(ai, asset)| (AssetSlot::Download(pi, ai), asset)),
                );

            for (slot, asset) in scheduled {
                let dest = self
                    .root
                    .join(asset.kind.subdir())
                    .join(&category_slug)
                    .join(format!("{}_{}", product_slug, asset.filename));
                if !owned.insert(dest.clone()) {
                    aliases.push((slot, dest));
                } else {
                    tasks.push(DownloadTask {
                        url: asset.url.clone(),
                        dest,
                        slot,
                    });
                }
            }
        }
        (tasks, aliases)
    }

    fn apply_outcome(
        &self,
        products: &mut [ProductRecord],
        slot: AssetSlot,
        dest: &Path,
        outcome: Outcome,
        stats: &mut DownloadStats,
    ) {
        let asset = match slot {
            AssetSlot::Image(pi, ai) => &mut products[pi].images[ai],
            AssetSlot::Download(pi, ai) => &mut products[pi].downloads[ai],
        };
        match outcome {
            Outcome::Downloaded | Outcome::AlreadyValid => {
                asset.mark_downloaded(relative_to_root(dest, self.root));
                if outcome == Outcome::Downloaded {
                    stats.downloaded += 1;
                } else {
                    stats.skipped_existing += 1;
                }
            }
            Outcome::Failed => {
                asset.mark_failed();
                stats.failed += 1;
            }
        }
    }
}

fn product_slug(product: &ProductRecord) -> String {
    let basis = if !product.name.is_empty() {
        product.name.as_str()
    } else if !product.sku.is_empty() {
        product.sku.as_str()
    } else {
        "unknown"
    };
    heuristics::slugify(basis)
}

fn relative_to_root(dest: &Path, root: &Path) -> String {
    dest.strip_prefix(root)
        .unwrap_or(dest)
        .to_string_lossy()
        .into_owned()
}

fn extension_of(dest: &Path) -> Option<String> {
    dest.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Fetch one asset with the idempotence check and content validation.
async fn fetch_one(fetcher: &dyn FetchPort, url: &str, dest: &Path) -> Result<Outcome> {
    let ext = extension_of(dest);

    if let Ok(head) = read_header(dest).await {
        if !heuristics::header_is_broken(&head, ext.as_deref()) {
            debug!("skipped (exists, valid): {}", dest.display());
            return Ok(Outcome::AlreadyValid);
        }
        info!("re-downloading broken file: {}", dest.display());
    }

    fetch_and_store(fetcher, url, dest).await?;
    Ok(Outcome::Downloaded)
}

/// Fetch a URL, validate the body, and write it atomically to `dest`.
/// Shared with the repair scanner so repairs go through the exact same
/// validation rule.
pub async fn fetch_and_store(fetcher: &dyn FetchPort, url: &str, dest: &Path) -> Result<()> {
    let fetched = fetcher
        .fetch_bytes(url)
        .await
        .with_context(|| format!("fetch failed for {url}"))?;
    if !fetched.is_success() {
        bail!("HTTP {} for {}", fetched.status, url);
    }

    validate_payload(&fetched.body, dest)?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = match dest.file_name() {
        Some(name) => dest.with_file_name(format!("{}.part", name.to_string_lossy())),
        None => bail!("destination {} has no filename", dest.display()),
    };
    tokio::fs::write(&tmp, &fetched.body)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;

    info!(
        "downloaded: {} ({}KB)",
        dest.display(),
        fetched.body.len() / 1024
    );
    Ok(())
}

/// Reject soft-error HTML bodies regardless of declared content type, and
/// PDF destinations whose body lacks the format magic.
fn validate_payload(body: &[u8], dest: &Path) -> Result<(), ContentError> {
    let filename = dest
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    if heuristics::header_looks_html(body) {
        return Err(ContentError::HtmlBody { filename });
    }
    if extension_of(dest).as_deref() == Some("pdf") && !body.starts_with(heuristics::PDF_MAGIC) {
        return Err(ContentError::MissingMagic {
            filename,
            magic: "%PDF".to_string(),
        });
    }
    Ok(())
}

async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = vec![0u8; heuristics::SNIFF_LEN];
    let n = file.read(&mut head).await?;
    head.truncate(n);
    Ok(head)
}
