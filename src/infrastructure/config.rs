//! Configuration loading and defaults.
//!
//! Defaults carry the constants tuned against the one origin this pipeline
//! ingests from; every heuristic threshold is a field here rather than a
//! hard-coded constant. A TOML file and `ORBUS_*` environment variables can
//! override any field.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub origin: OriginConfig,
    pub crawl: CrawlConfig,
    pub matching: MatchingConfig,
    pub download: DownloadConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// The single external website this pipeline ingests from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    pub base_url: String,
    /// Path of the downloads hub page listing authoritative file locations.
    pub downloads_path: String,
    /// Allow-listed host for direct asset links. Links pointing anywhere
    /// else are discarded when building the downloads index.
    pub asset_host: String,
    /// Fixed ordered list of category listing paths to crawl.
    pub category_paths: Vec<String>,
}

impl OriginConfig {
    pub fn downloads_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.downloads_path)
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.theexhibitorshandbook.com".to_string(),
            downloads_path: "/downloads/downloadable-resources".to_string(),
            asset_host: "s3cdn.theexhibitorshandbook.com".to_string(),
            category_paths: vec![
                "/products-by-category/portable-displays/banner-stands/retractable".to_string(),
                "/products-by-category/portable-displays/banner-stands/telescopic".to_string(),
                "/products-by-category/portable-displays/banner-stands/spring-back".to_string(),
            ],
        }
    }
}

/// Sequential crawl pacing and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Blocking pause after every category crawl and product scrape.
    pub request_delay_ms: u64,
    pub render_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub max_render_attempts: u32,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1500,
            render_timeout_secs: 30,
            fetch_timeout_secs: 30,
            max_render_attempts: 3,
            user_agent: "Mozilla/5.0 (compatible; research-bot/1.0)".to_string(),
        }
    }
}

/// Fuzzy name-matching thresholds. Tuned empirically against one site's
/// naming conventions; treat as configuration, not load-bearing constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum token overlap for initial asset resolution.
    pub initial_token_threshold: usize,
    /// Repair re-resolution is more permissive: the product identity is
    /// itself reconstructed from a filename.
    pub repair_token_threshold: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            initial_token_threshold: 3,
            repair_token_threshold: 2,
        }
    }
}

/// Download executor limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Cap on in-flight transfers.
    pub max_concurrent: usize,
    /// Politeness pause between download starts.
    pub throttle_ms: u64,
    /// Only this many image references per product are fetched.
    pub max_images_per_product: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            throttle_ms: 300,
            max_images_per_product: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the asset tree and the persisted database documents.
    pub root_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("orbus_catalog"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    pub console_output: bool,
    /// Append the run log to `scrape_log.txt` under the output root.
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration, layering an optional TOML file and `ORBUS_*`
    /// environment variables over the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("ORBUS").separator("__"))
            .build()
            .context("failed to assemble configuration sources")?;

        // Every section carries serde defaults, so a partial file or a bare
        // environment still deserializes into a complete tree.
        settings
            .try_deserialize()
            .context("configuration file has invalid structure")
    }
}
