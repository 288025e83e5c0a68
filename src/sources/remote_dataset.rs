use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use crate::models::RepoSlug;
use crate::sources::RepoSource;

// Line shape of the Boa "info.txt" companion file:
// lib[owner/name] = <metadata>
static LIB_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^lib\[(.*)\] = (.*)$").expect("hardcoded regex is valid"));

/// Downloads a remote plaintext dataset listing and extracts repository
/// slugs line by line. Lines not matching the listing pattern are
/// silently skipped.
pub struct RemoteDatasetSource {
    url: String,
    client: reqwest::Client,
}

impl RemoteDatasetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RepoSource for RemoteDatasetSource {
    async fn repo_slugs(&self) -> Result<Vec<RepoSlug>> {
        let text = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("cannot download dataset {}", self.url))?
            .text()
            .await?;

        let slugs = parse_dataset_lines(&text)?;
        info!(count = slugs.len(), url = %self.url, "loaded remote dataset");
        Ok(slugs)
    }
}

fn parse_dataset_lines(text: &str) -> Result<Vec<RepoSlug>> {
    text.lines()
        .filter_map(|line| LIB_LINE.captures(line))
        .map(|caps| {
            RepoSlug::parse(&caps[1]).with_context(|| format!("malformed slug in {:?}", &caps[0]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_slugs_from_matching_lines_only() {
        let text = concat!(
            "# header line\n",
            "lib[tensorflow/models] = some metadata\n",
            "unrelated noise\n",
            "lib[scikit-learn/scikit-learn] = more metadata\n",
        );
        let slugs = parse_dataset_lines(text).unwrap();
        assert_eq!(slugs.len(), 2);
        assert_eq!(slugs[0].to_string(), "tensorflow/models");
        assert_eq!(slugs[1].to_string(), "scikit-learn/scikit-learn");
    }

    #[test]
    fn empty_input_yields_no_slugs() {
        assert!(parse_dataset_lines("").unwrap().is_empty());
    }
}
