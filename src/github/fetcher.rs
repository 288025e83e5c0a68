use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::FetchError;
use crate::github::models::{ContentEntry, Repository};
use crate::github::GitHubClient;
use crate::models::RepoSlug;

/// Sleep once the remaining quota drops to this many calls.
const RATE_LIMIT_FLOOR: u32 = 5;
/// Extra seconds past the advertised reset time before resuming.
const RESET_GRACE_SECS: i64 = 5;

/// Wraps a [`GitHubClient`] and blocks before every quota-consuming
/// call while the acting credential's budget is nearly exhausted.
///
/// This is a best-effort backoff: the check and the subsequent call are
/// not atomic against the provider's live counters.
pub struct RateLimitedFetcher {
    client: GitHubClient,
}

impl RateLimitedFetcher {
    pub fn new(token: String) -> Self {
        Self {
            client: GitHubClient::new(token),
        }
    }

    async fn ensure_quota(&self) -> Result<(), FetchError> {
        let window = self.client.rate_limit().await?;
        if window.remaining > RATE_LIMIT_FLOOR {
            return Ok(());
        }

        let resume_at = DateTime::<Utc>::from_timestamp(window.reset + RESET_GRACE_SECS, 0)
            .unwrap_or_else(Utc::now);
        info!(
            remaining = window.remaining,
            resume_at = %resume_at,
            "rate limit nearly exhausted, sleeping until reset"
        );
        if let Ok(wait) = (resume_at - Utc::now()).to_std() {
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }

    pub async fn repository(&self, slug: &RepoSlug) -> Result<Repository, FetchError> {
        self.ensure_quota().await?;
        self.client.get_repository(slug).await
    }

    pub async fn has_commit_since(
        &self,
        slug: &RepoSlug,
        since: DateTime<Utc>,
    ) -> Result<bool, FetchError> {
        self.ensure_quota().await?;
        self.client.has_commit_since(slug, since).await
    }

    pub async fn list_directory(
        &self,
        slug: &RepoSlug,
        path: &str,
    ) -> Result<Option<Vec<ContentEntry>>, FetchError> {
        self.ensure_quota().await?;
        self.client.list_directory(slug, path).await
    }

    /// Raw downloads bypass the API quota, so no backoff is applied.
    pub async fn download_text(&self, url: &str) -> Result<String, FetchError> {
        self.client.download_text(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_grace_is_applied() {
        let reset = 1_700_000_000_i64;
        let resume_at = DateTime::<Utc>::from_timestamp(reset + RESET_GRACE_SECS, 0).unwrap();
        let advertised = DateTime::<Utc>::from_timestamp(reset, 0).unwrap();
        assert_eq!((resume_at - advertised).num_seconds(), 5);
    }
}
