mod collector;
mod distributor;
mod marketplace;
mod selector;
mod session;

pub use collector::WorkflowCollector;
pub use distributor::{RepoProcessor, WorkDistributor};
pub use marketplace::MarketplaceClient;
pub use selector::{Decision, RepositorySelector};
pub use session::{ScrapeSession, ScrapeSettings};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::github::RateLimitedFetcher;
use crate::models::RepoSlug;

/// One worker's view of the pipeline: fetch repository metadata through
/// its own rate-limited credential, decide inclusion, and download the
/// workflows of accepted repositories.
pub struct RepoWorker {
    fetcher: RateLimitedFetcher,
    selector: RepositorySelector,
    collector: WorkflowCollector,
    session: Arc<ScrapeSession>,
}

impl RepoWorker {
    pub fn new(
        token: String,
        selector: RepositorySelector,
        data_root: PathBuf,
        session: Arc<ScrapeSession>,
    ) -> Self {
        Self {
            fetcher: RateLimitedFetcher::new(token),
            selector,
            collector: WorkflowCollector::new(data_root, Arc::clone(&session)),
            session,
        }
    }
}

#[async_trait]
impl RepoProcessor for RepoWorker {
    async fn process(&self, slug: &RepoSlug) -> Result<()> {
        self.session.bump("repos_processed").await;

        let repo = match self.fetcher.repository(slug).await {
            Ok(repo) => repo,
            Err(FetchError::RepositoryUnavailable(_)) => {
                warn!(repo = %slug, "repository unavailable, skipping");
                self.session.bump("repos_unavailable").await;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match self.selector.evaluate(&self.fetcher, slug, &repo).await? {
            Decision::NoRecentCommit => {
                self.session.bump("repos_with_no_recent_commits").await;
                return Ok(());
            }
            Decision::NoKeywordMatch => {
                self.session.bump("repos_without_keyword_match").await;
                return Ok(());
            }
            Decision::Selected => {}
        }

        info!(repo = %slug, "repository selected");
        self.session.bump("repos_selected").await;
        self.session.record_selected(slug.clone()).await;
        // Write-through: persist the run record after every acceptance
        // so a crash loses at most the items in flight.
        self.session.dump().await?;

        self.collector.collect(&self.fetcher, slug).await
    }
}
