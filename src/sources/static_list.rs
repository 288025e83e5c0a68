use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::models::RepoSlug;
use crate::sources::RepoSource;

const GITHUB_URL_PREFIX: &str = "https://github.com/";

/// Reads newline-separated GitHub repository URLs from a local file,
/// e.g. the curated list of repositories using CML.
pub struct StaticListSource {
    path: PathBuf,
}

impl StaticListSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl RepoSource for StaticListSource {
    async fn repo_slugs(&self) -> Result<Vec<RepoSlug>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("cannot read repository list {}", self.path.display()))?;

        let slugs = parse_url_lines(&content)?;
        info!(
            count = slugs.len(),
            path = %self.path.display(),
            "loaded repository list"
        );
        Ok(slugs)
    }
}

fn parse_url_lines(content: &str) -> Result<Vec<RepoSlug>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let rest = line.strip_prefix(GITHUB_URL_PREFIX).unwrap_or(line);
            RepoSlug::parse(rest.trim_end_matches('/'))
                .with_context(|| format!("malformed repository URL {line:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_host_prefix_and_parses_slugs() {
        let content = "https://github.com/iterative/cml\nhttps://github.com/acme/demo/\n\n";
        let slugs = parse_url_lines(content).unwrap();
        assert_eq!(slugs.len(), 2);
        assert_eq!(slugs[0].to_string(), "iterative/cml");
        assert_eq!(slugs[1].to_string(), "acme/demo");
    }

    #[test]
    fn bare_slugs_are_accepted() {
        let slugs = parse_url_lines("owner/name\n").unwrap();
        assert_eq!(slugs[0].to_string(), "owner/name");
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_url_lines("https://github.com/not-a-slug\n").is_err());
    }

    #[tokio::test]
    async fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.txt");
        std::fs::write(&path, "https://github.com/iterative/cml\n").unwrap();

        let source = StaticListSource::new(path);
        let slugs = source.repo_slugs().await.unwrap();
        assert_eq!(slugs.len(), 1);
    }
}
