//! `roster` - run directory crawl jobs from the command line.
//!
//! Events are written to stdout as newline-delimited JSON; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use roster_core::{AppConfig, Partition, PartitionKind, SourceId};
use roster_engine::{DefinitionAdapter, JobConfig, Orchestrator, ScrapeEvent, SourceDriver};
use roster_http::HttpFetcher;
use roster_sources::{SourceFilter, SourceLoader, SourceRegistry};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Crawl professional directories politely")]
#[command(version)]
struct Cli {
    /// Directory holding source definitions (overrides config)
    #[arg(long, global = true)]
    definitions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known sources
    Sources {
        /// Only show sources in this category (e.g. bar-association)
        #[arg(long)]
        category: Option<String>,
    },

    /// Run a crawl job and print events as NDJSON
    Run {
        /// Source ID
        #[arg(short, long)]
        source: String,

        /// Partition values, searched in the order given
        #[arg(short, long = "partition", required = true)]
        partitions: Vec<String>,

        /// What the partition values are
        #[arg(short, long, value_enum, default_value_t = KindArg::City)]
        kind: KindArg,

        /// Stop each partition after this many pages
        #[arg(long)]
        page_cap: Option<u32>,

        /// Drop records older than this year
        #[arg(long)]
        min_year: Option<i32>,

        /// Consecutive empty pages tolerated before a partition stops
        #[arg(long)]
        max_empty: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    City,
    Region,
    PostalCode,
    SurnamePrefix,
    Specialty,
    GeoCell,
    Keyword,
}

impl From<KindArg> for PartitionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::City => Self::City,
            KindArg::Region => Self::Region,
            KindArg::PostalCode => Self::PostalCode,
            KindArg::SurnamePrefix => Self::SurnamePrefix,
            KindArg::Specialty => Self::Specialty,
            KindArg::GeoCell => Self::GeoCell,
            KindArg::Keyword => Self::Keyword,
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,roster=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn loader(config: &AppConfig, cli_dir: Option<PathBuf>) -> Result<SourceLoader> {
    let loader = match cli_dir.or_else(|| config.sources.definitions_dir.clone()) {
        Some(dir) => SourceLoader::new(dir)?,
        None => SourceLoader::with_default_dir()?,
    };
    Ok(loader)
}

fn list_sources(loader: &SourceLoader, category: Option<String>) -> Result<()> {
    let registry = SourceRegistry::load_from(loader)?;
    let filter = category.map_or(SourceFilter::All, SourceFilter::Category);

    let mut out = std::io::stdout().lock();
    for source in registry.get_all().iter().filter(|s| filter.matches(s)) {
        let kinds: Vec<String> = source
            .source
            .partition_kinds
            .iter()
            .map(ToString::to_string)
            .collect();
        writeln!(
            out,
            "{:<24} {:<18} {:<40} {}",
            source.id(),
            source.category().slug(),
            source.name(),
            kinds.join(",")
        )?;
    }
    Ok(())
}

async fn run_job(
    config: &AppConfig,
    loader: &SourceLoader,
    source: &str,
    job: JobConfig,
) -> Result<bool> {
    let source_id = SourceId::new(source)?;
    let definition = loader
        .load(&source_id)
        .with_context(|| format!("loading source {source_id}"))?;
    let driver = SourceDriver::paged(DefinitionAdapter::new(definition)?);

    let fetcher = HttpFetcher::new(
        &config.http,
        Duration::from_secs(config.crawl.request_timeout_secs),
    )?;
    let orchestrator = Orchestrator::from_config(config, Arc::new(fetcher));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current page");
            on_signal.cancel();
        }
    });

    let mut events = orchestrator.start(driver, job, cancel);
    let mut out = std::io::stdout().lock();
    let mut aborted = false;

    while let Some(event) = events.next().await {
        serde_json::to_writer(&mut out, &event)?;
        out.write_all(b"\n")?;
        out.flush()?;

        if let ScrapeEvent::JobAborted { reason, .. } = &event {
            warn!(reason = %reason, "job aborted");
            aborted = true;
        }
    }

    Ok(!aborted)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load_with_env().context("loading configuration")?;
    let loader = loader(&config, cli.definitions)?;

    match cli.command {
        Commands::Sources { category } => {
            list_sources(&loader, category)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            source,
            partitions,
            kind,
            page_cap,
            min_year,
            max_empty,
        } => {
            let kind = PartitionKind::from(kind);
            let partitions = partitions
                .iter()
                .map(|value| Partition::new(kind, value))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if partitions.is_empty() {
                bail!("at least one partition is required");
            }

            let mut job = JobConfig::new(SourceId::new(&source)?, partitions);
            job.page_cap = page_cap;
            job.min_year = min_year;
            job.max_consecutive_empty = max_empty;

            info!(source = %source, "starting crawl");
            if run_job(&config, &loader, &source, job).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
