use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::error::FetchError;
use crate::github::models::*;
use crate::models::RepoSlug;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "actions-miner";

/// Thin GitHub REST client bound to one personal access token.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::new(),
            token,
        }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Fetches repository metadata. 404/403/451 responses are mapped to
    /// `RepositoryUnavailable` and recovered per repository upstream.
    pub async fn get_repository(&self, slug: &RepoSlug) -> Result<Repository, FetchError> {
        let url = format!("{API_BASE}/repos/{slug}");
        let response = self.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS => {
                Err(FetchError::RepositoryUnavailable(slug.to_string()))
            }
            status => Err(api_error(status, response).await),
        }
    }

    /// Whether the repository has at least one commit at or after the
    /// given instant. Empty repositories (409) count as having none.
    pub async fn has_commit_since(
        &self,
        slug: &RepoSlug,
        since: DateTime<Utc>,
    ) -> Result<bool, FetchError> {
        let url = format!("{API_BASE}/repos/{slug}/commits");
        let response = self
            .get(&url)
            .query(&[("since", since.to_rfc3339()), ("per_page", "1".to_string())])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let commits: Vec<serde_json::Value> = response.json().await?;
                Ok(!commits.is_empty())
            }
            StatusCode::CONFLICT => Ok(false),
            StatusCode::NOT_FOUND => Err(FetchError::RepositoryUnavailable(slug.to_string())),
            status => Err(api_error(status, response).await),
        }
    }

    /// Lists a directory of the repository's default branch, or `None`
    /// when the path does not exist.
    pub async fn list_directory(
        &self,
        slug: &RepoSlug,
        path: &str,
    ) -> Result<Option<Vec<ContentEntry>>, FetchError> {
        let url = format!("{API_BASE}/repos/{slug}/contents/{path}");
        let response = self.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(api_error(status, response).await),
        }
    }

    /// Downloads a raw file by its advertised download URL. This hits
    /// the raw content host and does not consume API quota.
    pub async fn download_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response.status(), response).await);
        }
        Ok(response.text().await?)
    }

    /// Current core rate-limit window. This endpoint itself does not
    /// count against the quota.
    pub async fn rate_limit(&self) -> Result<RateLimitWindow, FetchError> {
        let url = format!("{API_BASE}/rate_limit");
        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response.status(), response).await);
        }
        let limits: RateLimitResponse = response.json().await?;
        Ok(limits.resources.core)
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> FetchError {
    let body = response.text().await.unwrap_or_default();
    FetchError::Api { status, body }
}
