//! CLI wiring for the catalog ingestion pipeline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use orbus_catalog::infrastructure::{config::AppConfig, fetch::HttpFetcher, logging};
use orbus_catalog::pipeline::CatalogPipeline;

#[derive(Parser)]
#[command(name = "orbus-catalog", about = "Catalog ingestion pipeline", version)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the output root directory.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full crawl: discover, extract, resolve, download, persist.
    Crawl,
    /// Scan the persisted asset tree for broken documents and repair them.
    Repair {
        /// Report what would be repaired without downloading anything.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(output) = cli.output {
        cfg.output.root_dir = output;
    }
    logging::init_logging(&cfg.logging, &cfg.output.root_dir)?;

    let fetcher = Arc::new(HttpFetcher::new(&cfg.crawl)?);
    let pipeline = CatalogPipeline::new(cfg, fetcher);

    match cli.command {
        Command::Crawl => {
            info!("starting catalog crawl");
            pipeline.run().await?;
        }
        Command::Repair { dry_run } => {
            info!("starting repair scan (dry_run={})", dry_run);
            let summary = pipeline.repair(dry_run).await?;
            if dry_run && summary.repaired > 0 {
                info!("dry run only; re-run without --dry-run to download");
            }
        }
    }
    Ok(())
}
