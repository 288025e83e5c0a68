use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::RepoSlug;

/// Settings snapshot persisted with every run record.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSettings {
    pub keywords: Vec<String>,
    pub activity_months_offset: Option<u32>,
    pub worker_count: usize,
    pub repository_count: usize,
}

#[derive(Serialize)]
struct SessionRecord<'a> {
    settings: &'a ScrapeSettings,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    stats: &'a BTreeMap<String, u64>,
    selected_slugs: Vec<String>,
}

/// Shared mutable state of one scraping run: the statistics counters
/// and the accumulating list of selected repositories.
///
/// The session is dumped to disk after every acceptance (write-through)
/// so a crash loses at most the items in flight.
pub struct ScrapeSession {
    settings: ScrapeSettings,
    started_at: DateTime<Utc>,
    stats: Mutex<BTreeMap<String, u64>>,
    selected: Mutex<Vec<RepoSlug>>,
    dump_path: PathBuf,
    dump_lock: Mutex<()>,
}

impl ScrapeSession {
    pub fn new(settings: ScrapeSettings, dumps_dir: &Path) -> Self {
        let started_at = Utc::now();
        let dump_path = dumps_dir.join(format!(
            "scrape-{}.json",
            started_at.format("%Y-%m-%d_%H-%M-%S")
        ));
        Self {
            settings,
            started_at,
            stats: Mutex::new(BTreeMap::new()),
            selected: Mutex::new(Vec::new()),
            dump_path,
            dump_lock: Mutex::new(()),
        }
    }

    pub async fn bump(&self, counter: &str) {
        let mut stats = self.stats.lock().await;
        *stats.entry(counter.to_string()).or_insert(0) += 1;
    }

    pub async fn add(&self, counter: &str, amount: u64) {
        let mut stats = self.stats.lock().await;
        *stats.entry(counter.to_string()).or_insert(0) += amount;
    }

    pub async fn record_selected(&self, slug: RepoSlug) {
        self.selected.lock().await.push(slug);
    }

    pub async fn stats(&self) -> BTreeMap<String, u64> {
        self.stats.lock().await.clone()
    }

    pub async fn selected_slugs(&self) -> Vec<String> {
        self.selected
            .lock()
            .await
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Serializes the current run record to the dump file, overwriting
    /// the previous incremental dump of the same run.
    ///
    /// Workers dump concurrently, so the serialize-and-write sequence
    /// is held under a lock and lands via temp-file rename: the record
    /// on disk is always one complete snapshot, never an interleaving
    /// of two.
    pub async fn dump(&self) -> Result<()> {
        let _guard = self.dump_lock.lock().await;
        let stats = self.stats.lock().await.clone();
        let selected_slugs = self.selected_slugs().await;
        let record = SessionRecord {
            settings: &self.settings,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stats: &stats,
            selected_slugs,
        };
        let json = serde_json::to_string_pretty(&record)?;
        let staging = self.dump_path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .with_context(|| format!("cannot write run record {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.dump_path)
            .await
            .with_context(|| format!("cannot finalize run record {}", self.dump_path.display()))?;
        Ok(())
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            keywords: vec!["machine-learning".to_string()],
            activity_months_offset: Some(6),
            worker_count: 2,
            repository_count: 10,
        }
    }

    #[tokio::test]
    async fn counters_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let session = ScrapeSession::new(settings(), dir.path());
        session.bump("repos_processed").await;
        session.bump("repos_processed").await;
        session.add("total_workflow_files", 3).await;

        let stats = session.stats().await;
        assert_eq!(stats.get("repos_processed"), Some(&2));
        assert_eq!(stats.get("total_workflow_files"), Some(&3));
    }

    #[tokio::test]
    async fn dump_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let session = ScrapeSession::new(settings(), dir.path());
        session.bump("repos_selected").await;
        session
            .record_selected(RepoSlug::parse("acme/demo").unwrap())
            .await;
        session.dump().await.unwrap();

        let json = std::fs::read_to_string(session.dump_path()).unwrap();
        let record: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(record["stats"]["repos_selected"], 1);
        assert_eq!(record["selected_slugs"][0], "acme/demo");
        assert_eq!(record["settings"]["worker_count"], 2);
    }

    #[tokio::test]
    async fn repeated_dumps_overwrite_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = ScrapeSession::new(settings(), dir.path());
        session.dump().await.unwrap();
        session.bump("repos_processed").await;
        session.dump().await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_dumps_never_tear_the_run_record() {
        let dir = tempfile::tempdir().unwrap();
        let session = std::sync::Arc::new(ScrapeSession::new(settings(), dir.path()));

        // Several workers bumping and dumping at once; records of
        // different lengths race for the same file.
        let mut handles = Vec::new();
        for worker in 0..8u32 {
            let session = std::sync::Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                for round in 0..25u32 {
                    session.bump("repos_processed").await;
                    if worker == 0 {
                        let slug = format!("acme/repo{round}");
                        session
                            .record_selected(RepoSlug::parse(&slug).unwrap())
                            .await;
                    }
                    session.dump().await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let json = std::fs::read_to_string(session.dump_path()).unwrap();
        let record: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(record["stats"]["repos_processed"], 200);
        assert_eq!(record["selected_slugs"].as_array().unwrap().len(), 25);
    }
}
