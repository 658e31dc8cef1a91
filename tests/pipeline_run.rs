//! End-to-end pipeline run against a canned fetch port: discovery through
//! persistence, idempotent re-run, and the repair scan over the fresh tree.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use orbus_catalog::domain::ResolutionStatus;
use orbus_catalog::infrastructure::config::AppConfig;
use orbus_catalog::infrastructure::errors::FetchError;
use orbus_catalog::infrastructure::fetch::{FetchPort, FetchedBody};
use orbus_catalog::pipeline::CatalogPipeline;

const BASE: &str = "https://www.theexhibitorshandbook.com";
const ASSET_HOST: &str = "s3cdn.theexhibitorshandbook.com";

struct FakeOrigin {
    pages: HashMap<String, String>,
    bodies: HashMap<String, Vec<u8>>,
    byte_fetches: AtomicUsize,
}

#[async_trait]
impl FetchPort for FakeOrigin {
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        self.pages.get(url).cloned().ok_or(FetchError::Status {
            status: 404,
            url: url.to_string(),
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBody, FetchError> {
        self.byte_fetches.fetch_add(1, Ordering::SeqCst);
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

fn fake_origin() -> FakeOrigin {
    let category_url = format!("{BASE}/products-by-category/portable-displays/banner-stands/retractable");
    let product_url = format!("{BASE}/retractable-banner-stand");
    let hub_url = format!("{BASE}/downloads/downloadable-resources");
    let pdf_url = format!("https://{ASSET_HOST}/GraphicTemplates/GT_banner_stand.pdf");
    let image_url = format!("{BASE}/media/gallery/stand-main.jpg");

    let category_html = format!(
        r#"<html><body>
           <a href="/retractable-banner-stand">Retractable Banner Stand</a>
           <a href="/retractable-banner-stand">Duplicate link</a>
           <a href="/downloads/downloadable-resources">Downloads hub</a>
           <a href="https://elsewhere.com/retractable-banner-stand">Foreign</a>
           </body></html>"#
    );
    let product_html = r#"<html><body>
        <h1 class="product-title">Retractable Banner Stand</h1>
        <span class="product-sku">SKU: TB-RBS-01</span>
        <div class="price-box">$129.00</div>
        <div class="product-description">A durable retractable stand.</div>
        <img src="/media/gallery/stand-main.jpg">
        <table><tr><th>Width</th><td>33in</td></tr></table>
        </body></html>"#
        .to_string();
    let hub_html = format!(
        r#"<table><tr>
           <td class="name">Retractable Banner Stand</td>
           <td><a href="{pdf_url}">Graphic template</a></td>
           </tr></table>"#
    );

    let mut pages = HashMap::new();
    pages.insert(category_url, category_html);
    pages.insert(product_url, product_html);
    pages.insert(hub_url, hub_html);

    let mut bodies = HashMap::new();
    bodies.insert(pdf_url, b"%PDF-1.4 graphic template".to_vec());
    bodies.insert(image_url, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x10, 0x4A]);

    FakeOrigin {
        pages,
        bodies,
        byte_fetches: AtomicUsize::new(0),
    }
}

fn test_config(root: PathBuf) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.origin.category_paths = vec![
        "/products-by-category/portable-displays/banner-stands/retractable".to_string(),
        "/products-by-category/portable-displays/banner-stands/missing".to_string(),
    ];
    cfg.crawl.request_delay_ms = 0;
    cfg.download.throttle_ms = 0;
    cfg.output.root_dir = root;
    cfg
}

#[tokio::test]
async fn full_run_persists_database_and_assets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = test_config(dir.path().to_path_buf());
    let fetcher = Arc::new(fake_origin());
    let pipeline = CatalogPipeline::new(cfg, fetcher.clone());

    let summary = pipeline.run().await.expect("pipeline run");

    // One category succeeded, one 404'd and was skipped without aborting.
    assert_eq!(summary.categories_crawled, 2);
    assert_eq!(summary.urls_discovered, 1);
    assert_eq!(summary.records_kept, 1);
    assert_eq!(summary.downloads_failed, 0);

    let db_raw = std::fs::read_to_string(dir.path().join("products.json")).expect("database");
    let db: serde_json::Value = serde_json::from_str(&db_raw).expect("valid json");
    assert_eq!(db["metadata"]["total_products"], 1);
    assert_eq!(db["metadata"]["categories"][0], "Retractable");

    let product = &db["products"][0];
    assert_eq!(product["name"], "Retractable Banner Stand");
    assert_eq!(product["sku"], "TB-RBS-01");
    assert_eq!(product["downloads"][0]["status"], "downloaded");

    assert!(dir
        .path()
        .join("templates/retractable/retractable_banner_stand_GT_banner_stand.pdf")
        .exists());
    assert!(dir
        .path()
        .join("images/retractable/retractable_banner_stand_stand-main.jpg")
        .exists());
    assert!(dir.path().join("product_index.json").exists());
}

#[tokio::test]
async fn rerun_is_idempotent_and_repair_finds_nothing_broken() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = test_config(dir.path().to_path_buf());
    let fetcher = Arc::new(fake_origin());
    let pipeline = CatalogPipeline::new(cfg, fetcher.clone());

    pipeline.run().await.expect("first run");
    let fetches_after_first = fetcher.byte_fetches.load(Ordering::SeqCst);
    assert_eq!(fetches_after_first, 2);

    // Unchanged manifest with all files valid: zero network fetches.
    let summary = pipeline.run().await.expect("second run");
    assert_eq!(fetcher.byte_fetches.load(Ordering::SeqCst), fetches_after_first);
    assert_eq!(summary.downloads_skipped_existing, 2);
    assert_eq!(summary.downloads_succeeded, 0);

    // Round-trip: nothing the executor wrote scans as broken.
    let repair = pipeline.repair(false).await.expect("repair run");
    assert_eq!(repair.broken, 0);
    assert_eq!(repair.repaired, 0);
}

#[tokio::test]
async fn failed_download_is_left_for_repair() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = test_config(dir.path().to_path_buf());

    let mut origin = fake_origin();
    // The origin serves a soft-error page for the template on the first pass.
    let pdf_url = format!("https://{ASSET_HOST}/GraphicTemplates/GT_banner_stand.pdf");
    origin
        .bodies
        .insert(pdf_url.clone(), b"<!doctype html><html>error</html>".to_vec());
    let fetcher = Arc::new(origin);
    let pipeline = CatalogPipeline::new(cfg, fetcher.clone());

    let summary = pipeline.run().await.expect("pipeline run");
    assert_eq!(summary.downloads_failed, 1);

    let db_raw = std::fs::read_to_string(dir.path().join("products.json")).expect("database");
    let db: serde_json::Value = serde_json::from_str(&db_raw).expect("valid json");
    let status = db["products"][0]["downloads"][0]["status"]
        .as_str()
        .expect("status");
    assert_eq!(
        serde_json::to_value(ResolutionStatus::Failed).expect("serialize"),
        status
    );
    // The file was never written; the repair pass has nothing local to fix
    // until a later run re-attempts it.
    assert!(!dir.path().join("templates").exists());
}
