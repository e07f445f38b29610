use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use lotharvest_engine::browser::StaticHtmlSession;
use lotharvest_engine::catalog::{CatalogExtractor, CatalogRequest};
use lotharvest_engine::config::{load_config, HarvestConfig};
use lotharvest_engine::paths::OutputPaths;
use lotharvest_engine::snapshot::{load_snapshot, save_snapshot};
use lotharvest_engine::thumbnails::{run_thumbnail_batch, ThumbnailRequest};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lotharvest")]
#[command(about = "Harvest auction catalogs and build lot thumbnails")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a catalog into auction_<id>.json
    #[command(group(ArgGroup::new("target").required(true).args(["auction_id", "url"])))]
    Scrape {
        #[arg(long)]
        auction_id: Option<String>,
        /// Full catalog URL
        #[arg(long)]
        url: Option<String>,
        /// Free-form label stored with the snapshot (e.g. Sunday)
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "auction_data")]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Download and normalize thumbnails for a saved catalog
    Thumbs {
        /// Snapshot written by `scrape`
        #[arg(long = "in")]
        input: PathBuf,
        /// Defaults to the snapshot's auction id
        #[arg(long)]
        auction_id: Option<String>,
        #[arg(long, default_value = "auction_site")]
        out: PathBuf,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Optional CSV report, one row per lot
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn load(config: Option<&PathBuf>) -> Result<HarvestConfig, String> {
    load_config(config.map(PathBuf::as_path)).map_err(|e| e.to_string())
}

fn main() -> Result<(), String> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            auction_id,
            url,
            label,
            out,
            config,
        } => {
            let config = load(config.as_ref())?;
            let request = CatalogRequest::resolve(
                auction_id.as_deref(),
                url.as_deref(),
                label.as_deref(),
                &config.catalog.catalog_url_template,
            )
            .map_err(|e| e.to_string())?;

            let client = config.http.client();
            let mut session = StaticHtmlSession::new(config.http.client(), config.http.retry);
            let extractor = CatalogExtractor::new(config.catalog.clone(), config.http.retry);
            let snapshot = extractor
                .extract(&mut session, &client, &request)
                .map_err(|e| e.to_string())?;

            let path = OutputPaths::new(&out).snapshot_path(&snapshot.auction_id);
            save_snapshot(&path, &snapshot).map_err(|e| e.to_string())?;
            println!("Saved {} lots to {}", snapshot.items.len(), path.display());
        }
        Commands::Thumbs {
            input,
            auction_id,
            out,
            workers,
            config,
            manifest,
        } => {
            let mut config = load(config.as_ref())?;
            if let Some(workers) = workers {
                config.thumbnails.workers = workers;
            }
            let config = config.clamped();

            let snapshot = load_snapshot(&input).map_err(|e| e.to_string())?;
            let auction_id = auction_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| snapshot.auction_id.clone());
            if auction_id.is_empty() {
                return Err("no auction id in snapshot; pass --auction-id".to_string());
            }

            let request = ThumbnailRequest {
                auction_id,
                output_root: out,
                options: config.thumbnails.clone(),
                retry: config.http.retry,
                manifest_path: manifest,
            };
            let http = config.http.clone();
            let report = run_thumbnail_batch(
                &request,
                &snapshot.items,
                || http.client(),
                || Ok(false),
                |_| Ok(()),
            )
            .map_err(|e| e.to_string())?;

            let summary = report.summary;
            println!(
                "Thumbnails complete: total={} downloaded={} skipped={} failed={}",
                summary.total, summary.downloaded, summary.skipped, summary.failed
            );
        }
    }

    Ok(())
}
