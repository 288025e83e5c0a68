use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::models::RepoSlug;

/// Pause after an unexpected per-item failure before taking the next
/// item from the queue.
const WORKER_BACKOFF: Duration = Duration::from_secs(2);

/// Per-repository processing run by each worker. Expected per-repo
/// conditions (unavailable repository, invalid files) are handled and
/// counted inside `process`; only unexpected failures return `Err`.
#[async_trait]
pub trait RepoProcessor: Send + Sync {
    async fn process(&self, slug: &RepoSlug) -> Result<()>;
}

enum WorkItem {
    Repo(RepoSlug),
    /// One per worker; a worker stops after consuming it.
    Done,
}

/// Fans repository slugs out across one worker task per API credential
/// through a single shared FIFO queue.
///
/// The queue is seeded with all M slugs followed by exactly N sentinel
/// items, so every worker drains slugs until it consumes one sentinel.
/// Completion is signalled by joining all workers, which by
/// construction implies every slug and every sentinel was dequeued
/// exactly once.
pub struct WorkDistributor {
    queue: Arc<Mutex<VecDeque<WorkItem>>>,
    worker_count: usize,
    backoff: Duration,
}

impl WorkDistributor {
    pub fn new(slugs: Vec<RepoSlug>, worker_count: usize) -> Self {
        let mut queue: VecDeque<WorkItem> = slugs.into_iter().map(WorkItem::Repo).collect();
        for _ in 0..worker_count {
            queue.push_back(WorkItem::Done);
        }
        Self {
            queue: Arc::new(Mutex::new(queue)),
            worker_count,
            backoff: WORKER_BACKOFF,
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs one worker per processor until the queue is drained. The
    /// processor list length must equal the worker count given at
    /// construction, one processor per credential.
    pub async fn run(self, processors: Vec<Arc<dyn RepoProcessor>>) -> Result<()> {
        debug_assert_eq!(processors.len(), self.worker_count);

        let mut handles = Vec::with_capacity(processors.len());
        for (worker_id, processor) in processors.into_iter().enumerate() {
            let queue = Arc::clone(&self.queue);
            let backoff = self.backoff;
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, processor, backoff).await;
            }));
        }

        // Queue-drain barrier: all slugs and sentinels acknowledged.
        for result in futures::future::join_all(handles).await {
            result?;
        }
        Ok(())
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<WorkItem>>>,
    processor: Arc<dyn RepoProcessor>,
    backoff: Duration,
) {
    info!(worker_id, "worker started");
    loop {
        let item = queue.lock().await.pop_front();
        match item {
            Some(WorkItem::Repo(slug)) => {
                if let Err(e) = processor.process(&slug).await {
                    // Failure isolation: log, pause briefly, move on to
                    // the next queued repository.
                    error!(worker_id, repo = %slug, "unexpected worker failure: {e:#}");
                    tokio::time::sleep(backoff).await;
                }
            }
            Some(WorkItem::Done) | None => {
                info!(worker_id, "worker finished");
                return;
            }
        }
    }
}
