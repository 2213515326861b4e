//! Command-line driver that turns a relationship dump into a benchmark dataset
//!
//! ```bash
//! # JSON array or JSON lines of relationships
//! access-dataset --dump relationships.jsonl --output dataset.json
//!
//! # pin the users exercised by list benchmarks
//! HEAVY_MANAGE_USER=alice access-dataset --dump relationships.jsonl --pretty
//! ```
//!
//! Settings not given as flags come from the environment (and `.env`):
//! `ACCESS_PAGE_SIZE`, `ACCESS_PARALLEL_INGEST`, `ACCESS_MAX_PAIRS`,
//! `HEAVY_MANAGE_USER`, `REGULAR_VIEW_USER`.

use access_closure::{AccessPath, Dataset, DatasetBuilder, DatasetConfig, JsonDumpSource, UserOverrides};
use anyhow::Context;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "access-dataset")]
#[command(about = "Build permission benchmark inputs from a relationship dump")]
pub struct Args {
    /// Relationship dump (JSON array or JSON lines)
    #[arg(long, env = "ACCESS_DUMP_PATH")]
    pub dump: PathBuf,

    /// Write the dataset here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Edges requested per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Ingest edge kinds one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Cap on each sample-pair list
    #[arg(long)]
    pub max_pairs: Option<usize>,

    /// Force the heavy manage user
    #[arg(long)]
    pub heavy_manage_user: Option<String>,

    /// Force the regular view user
    #[arg(long)]
    pub regular_view_user: Option<String>,

    /// Pretty-print the dataset JSON
    #[arg(long)]
    pub pretty: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    /// Environment configuration with explicit flags layered on top
    pub fn dataset_config(&self) -> anyhow::Result<DatasetConfig> {
        let base = DatasetConfig::from_env().context("Invalid dataset configuration")?;
        self.layer_over(base)
    }

    /// Apply explicit flags over `base`; a flag wins over the matching setting
    pub fn layer_over(&self, mut config: DatasetConfig) -> anyhow::Result<DatasetConfig> {
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if self.sequential {
            config = config.with_parallel_ingest(false);
        }
        if self.max_pairs.is_some() {
            config = config.with_max_pairs(self.max_pairs);
        }

        let overrides = UserOverrides::new(
            self.heavy_manage_user
                .clone()
                .or(config.overrides.heavy_manage_user.clone()),
            self.regular_view_user
                .clone()
                .or(config.overrides.regular_view_user.clone()),
        );
        config = config.with_overrides(overrides);

        config.validate()?;
        Ok(config)
    }
}

pub fn init_tracing(verbose: bool, json: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("access_closure={},dataset_cli={}", level, level).into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()?;
    } else {
        let use_colors = std::env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stderr);
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_colors)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}

/// Build the dataset described by `args` and write it out
pub async fn run(args: &Args) -> anyhow::Result<Dataset> {
    let config = args.dataset_config()?;
    build_dataset(args, config).await
}

/// Same as [`run`] with an already resolved configuration
pub async fn build_dataset(args: &Args, config: DatasetConfig) -> anyhow::Result<Dataset> {
    info!("📂 Reading relationship dump {}", args.dump.display());
    let source = JsonDumpSource::from_path(&args.dump)
        .with_context(|| format!("Failed to load {}", args.dump.display()))?;
    info!("Dump holds {} relationships", source.total());

    let dataset = DatasetBuilder::new(config)
        .build(Arc::new(source))
        .await
        .context("Dataset build aborted")?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&dataset)?
    } else {
        serde_json::to_string(&dataset)?
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("✅ Dataset written to {}", path.display());
        }
        None => println!("{}", json),
    }

    report(&dataset);
    Ok(dataset)
}

fn report(dataset: &Dataset) {
    for (path, label) in [
        (AccessPath::DirectManager, "direct-manager"),
        (AccessPath::OrgAdmin, "org-admin"),
        (AccessPath::GroupView, "group-view"),
    ] {
        let count = dataset.pairs(path).len();
        if count == 0 {
            warn!("{} {} benchmark will be skipped (no pairs)", "⚠".yellow(), label);
        } else {
            info!("{} pairs: {}", label, count.to_string().bright_white());
        }
    }

    match dataset.heavy_manage_user {
        Some(ref user) => info!("Heavy manage user: {}", user.bright_cyan()),
        None => warn!("No heavy manage user; list-manage benchmark will be skipped"),
    }
    match dataset.regular_view_user {
        Some(ref user) => info!("Regular view user: {}", user.bright_cyan()),
        None => warn!("No regular view user; list-view benchmark will be skipped"),
    }
}
