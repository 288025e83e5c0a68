mod analyze;
mod config;
mod error;
mod github;
mod models;
mod scrape;
mod sources;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analyze::WorkflowAnalyzer;
use config::Config;
use models::RepoSlug;
use scrape::{
    RepoProcessor, RepoWorker, RepositorySelector, ScrapeSession, ScrapeSettings, WorkDistributor,
};
use sources::{ReaperFilter, ReaperSource, RemoteDatasetSource, RepoSource, StaticListSource};

/// The Boa "info.txt" companion file listing mature data-science
/// projects.
const BOA_DATASET_URL: &str =
    "https://raw.githubusercontent.com/boalang/MSR19-DataShowcase/master/info.txt";
/// RepoReaper dataset of engineered GitHub projects.
const REAPER_DATASET_URL: &str = "https://reporeapers.github.io/static/downloads/dataset.csv.gz";

#[derive(Parser)]
#[command(
    name = "actions-miner",
    version,
    about = "Collects GitHub Actions workflows from a repository corpus and mines them for recurring CI patterns"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the configured repository corpus and download workflows
    Collect {
        #[arg(long, value_enum, default_value = "cml")]
        source: SourceKind,
        /// Repository URL list for the static (CML) source
        #[arg(long, default_value = "cml-repos.txt")]
        list_file: PathBuf,
        /// Star threshold for the RepoReaper source (rows must exceed it)
        #[arg(long, default_value_t = 1)]
        min_stars: u32,
        /// Filter RepoReaper rows by a classifier flag column instead of
        /// stars (e.g. "unanimous")
        #[arg(long)]
        classifier: Option<String>,
    },
    /// Re-parse collected workflows and mine frequent patterns
    Analyze {
        /// Also scrape marketplace metadata per distinct action
        #[arg(long)]
        marketplace: bool,
        /// Override the configured minimum support threshold
        #[arg(long)]
        min_support: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    /// Static file of repositories using CML
    Cml,
    /// Remote Boa "info.txt" dataset listing
    Boa,
    /// RepoReaper gzip CSV dataset filtered by stars
    Reaper,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.ensure_directories()?;

    match cli.command {
        Command::Collect {
            source,
            list_file,
            min_stars,
            classifier,
        } => {
            let reaper_filter = match classifier {
                Some(column) => ReaperFilter::ClassifierFlag(column),
                None => ReaperFilter::MinStars(min_stars),
            };
            collect(&config, source, list_file, reaper_filter).await
        }
        Command::Analyze {
            marketplace,
            min_support,
        } => {
            let analyzer = WorkflowAnalyzer::new(
                config.data_dir.clone(),
                config.output_dir.clone(),
                min_support.unwrap_or(config.min_support),
            );
            analyzer.run(marketplace).await
        }
    }
}

async fn collect(
    config: &Config,
    source: SourceKind,
    list_file: PathBuf,
    reaper_filter: ReaperFilter,
) -> Result<()> {
    let source: Box<dyn RepoSource> = match source {
        SourceKind::Cml => Box::new(StaticListSource::new(list_file)),
        SourceKind::Boa => Box::new(RemoteDatasetSource::new(BOA_DATASET_URL)),
        SourceKind::Reaper => Box::new(ReaperSource::new(
            REAPER_DATASET_URL,
            config.data_dir.join("datasets"),
            reaper_filter,
        )),
    };

    let slugs = dedup_preserving_order(source.repo_slugs().await?);
    info!(count = slugs.len(), "candidate repositories");

    let settings = ScrapeSettings {
        keywords: config.keywords.clone(),
        activity_months_offset: config.activity_months_offset,
        worker_count: config.tokens.len(),
        repository_count: slugs.len(),
    };
    let session = Arc::new(ScrapeSession::new(settings, &config.dumps_dir));
    let selector = RepositorySelector::new(&config.keywords, config.activity_months_offset);

    let workers: Vec<Arc<dyn RepoProcessor>> = config
        .tokens
        .iter()
        .map(|token| {
            Arc::new(RepoWorker::new(
                token.clone(),
                selector.clone(),
                config.data_dir.clone(),
                Arc::clone(&session),
            )) as Arc<dyn RepoProcessor>
        })
        .collect();

    let distributor = WorkDistributor::new(slugs, workers.len());
    distributor.run(workers).await?;

    session.dump().await?;
    let stats = session.stats().await;
    info!(record = %session.dump_path().display(), "scrape finished");
    for (counter, value) in stats {
        info!("  {counter} = {value}");
    }
    Ok(())
}

fn dedup_preserving_order(slugs: Vec<RepoSlug>) -> Vec<RepoSlug> {
    let mut seen = HashSet::new();
    slugs
        .into_iter()
        .filter(|slug| seen.insert(slug.clone()))
        .collect()
}
