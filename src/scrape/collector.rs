use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::github::{RateLimitedFetcher, WORKFLOWS_DIR};
use crate::models::RepoSlug;
use crate::scrape::session::ScrapeSession;

/// Downloads the workflow files of selected repositories into the local
/// data layout `<data-root>/<owner>/<name>/<workflow-file>`.
///
/// Owner and name are written as two nested directories; the analysis
/// stage relies on exactly this layout to re-derive the slug.
pub struct WorkflowCollector {
    data_root: PathBuf,
    session: Arc<ScrapeSession>,
}

impl WorkflowCollector {
    pub fn new(data_root: PathBuf, session: Arc<ScrapeSession>) -> Self {
        Self { data_root, session }
    }

    pub async fn collect(&self, fetcher: &RateLimitedFetcher, slug: &RepoSlug) -> Result<()> {
        let repo_dir = self.data_root.join(slug.owner()).join(slug.name());
        if repo_dir.exists() {
            // Resumable download: a previous run already fetched this
            // repository.
            debug!(repo = %slug, "local directory exists, skipping download");
            self.session.bump("repos_already_collected").await;
            return Ok(());
        }

        let Some(entries) = fetcher.list_directory(slug, WORKFLOWS_DIR).await? else {
            self.session.bump("repos_without_workflows").await;
            return Ok(());
        };

        let workflows: Vec<_> = entries
            .iter()
            .filter(|entry| entry.entry_type == "file" && is_yaml_filename(&entry.name))
            .collect();
        if workflows.is_empty() {
            self.session.bump("repos_without_workflows").await;
            return Ok(());
        }

        let mut valid = 0u64;
        let mut invalid = 0u64;
        for entry in workflows {
            let Some(url) = entry.download_url.as_deref() else {
                continue;
            };
            let text = fetcher.download_text(url).await?;
            match canonicalize_workflow(&text) {
                Some(canonical) => {
                    tokio::fs::create_dir_all(&repo_dir).await?;
                    let target = repo_dir.join(&entry.name);
                    tokio::fs::write(&target, canonical)
                        .await
                        .with_context(|| format!("cannot write {}", target.display()))?;
                    valid += 1;
                }
                // One file's invalid YAML never aborts the repository.
                None => invalid += 1,
            }
        }

        if valid > 0 {
            self.session.bump("repos_with_at_least_one_workflow").await;
            self.session.add("total_workflow_files", valid).await;
        }
        if invalid > 0 {
            self.session.add("invalid_workflow_files", invalid).await;
        }
        info!(repo = %slug, valid, invalid, "collected workflows");
        Ok(())
    }
}

pub fn is_yaml_filename(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

/// Parses the downloaded text as a YAML mapping and re-serializes it
/// canonically, or `None` when the content is not a valid workflow
/// mapping.
pub fn canonicalize_workflow(text: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    if !value.is_mapping() {
        return None;
    }
    serde_yaml::to_string(&value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::session::ScrapeSettings;

    #[tokio::test]
    async fn existing_local_directory_skips_the_repository() {
        let data = tempfile::tempdir().unwrap();
        let dumps = tempfile::tempdir().unwrap();
        let repo_dir = data.path().join("acme/demo");
        std::fs::create_dir_all(&repo_dir).unwrap();
        let marker = repo_dir.join("ci.yml");
        std::fs::write(&marker, "on: push\njobs: {}\n").unwrap();

        let settings = ScrapeSettings {
            keywords: Vec::new(),
            activity_months_offset: None,
            worker_count: 1,
            repository_count: 1,
        };
        let session = Arc::new(ScrapeSession::new(settings, dumps.path()));
        let collector = WorkflowCollector::new(data.path().to_path_buf(), Arc::clone(&session));

        // Returns before any network access when the directory exists.
        let fetcher = RateLimitedFetcher::new("unused-token".to_string());
        let slug = crate::models::RepoSlug::parse("acme/demo").unwrap();
        collector.collect(&fetcher, &slug).await.unwrap();

        let stats = session.stats().await;
        assert_eq!(stats.get("repos_already_collected"), Some(&1));
        assert_eq!(
            std::fs::read_to_string(&marker).unwrap(),
            "on: push\njobs: {}\n"
        );
    }

    #[test]
    fn yaml_extensions_are_recognized() {
        assert!(is_yaml_filename("ci.yml"));
        assert!(is_yaml_filename("ci.yaml"));
        assert!(is_yaml_filename("CI.YML"));
        assert!(!is_yaml_filename("README.md"));
        assert!(!is_yaml_filename("yml"));
    }

    #[test]
    fn canonicalization_round_trips_a_mapping() {
        let canonical = canonicalize_workflow("on: push\njobs: {}\n").unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&canonical).unwrap();
        assert!(value.is_mapping());
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        assert!(canonicalize_workflow("- a\n- b\n").is_none());
        assert!(canonicalize_workflow("just a scalar").is_none());
        assert!(canonicalize_workflow("{unbalanced").is_none());
    }
}
