use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while constructing the value objects of the study
/// (slugs, action references, workflow documents). These are always
/// fatal to the single entity being built, never to the batch.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid repository slug {0:?}: expected <owner>/<name>")]
    InvalidSlugFormat(String),

    #[error("invalid action reference {0:?}: expected <owner>/<name>[@ref]")]
    InvalidActionReference(String),

    #[error("malformed workflow {}: {reason}", path.display())]
    MalformedWorkflow { path: PathBuf, reason: String },
}

/// Errors raised by GitHub API access. `RepositoryUnavailable` covers
/// deleted, private and otherwise unreachable repositories and is
/// recovered per repository; everything else bubbles up to the worker's
/// failure-isolation boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("repository {0} is unavailable (not found or inaccessible)")]
    RepositoryUnavailable(String),

    #[error("GitHub API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
