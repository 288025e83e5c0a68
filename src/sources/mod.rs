mod reaper;
mod remote_dataset;
mod static_list;

pub use reaper::{ReaperFilter, ReaperSource};
pub use remote_dataset::RemoteDatasetSource;
pub use static_list::StaticListSource;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RepoSlug;

/// Anything that can produce the list of candidate repositories for a
/// scraping run.
#[async_trait]
pub trait RepoSource {
    async fn repo_slugs(&self) -> Result<Vec<RepoSlug>>;
}
