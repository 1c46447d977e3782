//! `pharmacien` CLI: dataset generation, loading, embedding backfill and
//! the HTTP server.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pharmacien::{
    BackendConfig, Collection, Dataset, DocumentStore, PharmacienConfig, StoreConfig,
    build_embedder,
};
use tracing::info;

const DEFAULT_DATASET_PATH: &str = "data/pharmacien_dataset.json";

#[derive(Parser)]
#[command(name = "pharmacien", version)]
#[command(about = "Pharmacy data service: seed, embed and serve the document store")]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `pharmacien=debug`
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the synthetic dataset to a JSON file
    Generate {
        #[arg(short, long, default_value = DEFAULT_DATASET_PATH)]
        out: PathBuf,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Clear and load every collection from a dataset file
    Ingest {
        #[arg(short, long, default_value = DEFAULT_DATASET_PATH)]
        input: PathBuf,
    },
    /// Clear collections (all of them when none are named)
    Cleanup {
        #[arg(value_name = "COLLECTION")]
        collections: Vec<String>,
    },
    /// Embed documents that have no vector yet
    Embed {
        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Cleanup, generate and ingest in one go
    Setup {
        /// Also backfill embeddings
        #[arg(long)]
        embed: bool,
    },
    /// Print the record count of every collection
    Stats,
    /// Run the HTTP server on the configured store
    #[cfg(feature = "server")]
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_target(false)
        .init();

    let cfg = match &cli.config {
        Some(path) => PharmacienConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PharmacienConfig::default(),
    };

    match cli.command {
        Commands::Generate { out, seed } => {
            let mut dataset_cfg = cfg.dataset.clone();
            if let Some(seed) = seed {
                dataset_cfg = dataset_cfg.with_seed(seed);
            }
            let dataset = pharmacien::generate(&dataset_cfg, Utc::now());
            dataset.write_json(&out)?;
            info!(path = %out.display(), seed = dataset.seed, "dataset written");
            print_counts(dataset.counts());
        }
        Commands::Ingest { input } => {
            let dataset = Dataset::read_json(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let store = open_store(&cfg.store)?;
            let counts = pharmacien::ingest(&store, dataset)?;
            print_counts(counts);
        }
        Commands::Cleanup { collections } => {
            let targets = if collections.is_empty() {
                Collection::ALL.to_vec()
            } else {
                collections
                    .iter()
                    .map(|name| name.parse::<Collection>())
                    .collect::<Result<Vec<_>, _>>()?
            };
            let store = open_store(&cfg.store)?;
            let cleared = pharmacien::cleanup(&store, &targets)?;
            print_counts(cleared);
        }
        Commands::Embed { batch_size } => {
            let mut backfill = cfg.backfill.clone();
            if let Some(n) = batch_size {
                backfill = backfill.with_batch_size(n);
            }
            let store = open_store(&cfg.store)?;
            let embedder = build_embedder(&cfg.embedder)?;
            let report =
                pharmacien::backfill_embeddings(&store, embedder.as_ref(), &backfill).await?;
            println!(
                "embedded {} documents in {} batches with {}",
                report.embedded, report.batches, report.model
            );
            if report.skipped > 0 {
                println!("skipped {} documents with blank content", report.skipped);
            }
        }
        Commands::Setup { embed } => {
            let store = open_store(&cfg.store)?;
            let embedder = if embed {
                Some(build_embedder(&cfg.embedder)?)
            } else {
                None
            };
            let report = pharmacien::setup(
                &store,
                embedder.as_deref(),
                &cfg.dataset,
                &cfg.backfill,
                Utc::now(),
            )
            .await?;
            print_counts(report.inserted);
            if let Some(backfill) = report.backfill {
                println!(
                    "embedded {} documents with {}",
                    backfill.embedded, backfill.model
                );
            }
        }
        Commands::Stats => {
            let store = open_store(&cfg.store)?;
            print_counts(store.counts()?);
        }
        #[cfg(feature = "server")]
        Commands::Serve => {
            ensure_store_dir(&cfg.store)?;
            let mut server_cfg = server::ServerConfig::load()?;
            server_cfg.store = cfg.store.clone();
            server_cfg.embedder = cfg.embedder.clone();
            server::start_server(server_cfg).await?;
        }
    }

    Ok(())
}

fn open_store(cfg: &StoreConfig) -> anyhow::Result<DocumentStore> {
    ensure_store_dir(cfg)?;
    Ok(DocumentStore::new(cfg.clone())?)
}

/// redb creates the file but not its directory.
fn ensure_store_dir(cfg: &StoreConfig) -> anyhow::Result<()> {
    if let BackendConfig::Redb { path } = &cfg.backend {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

fn print_counts(counts: impl IntoIterator<Item = (Collection, usize)>) {
    let mut total = 0;
    for (collection, n) in counts {
        println!("{:<14} {n:>6}", collection.name());
        total += n;
    }
    println!("{:<14} {total:>6}", "total");
}
