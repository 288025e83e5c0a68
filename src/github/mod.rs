mod client;
mod fetcher;
pub mod models;

pub use client::GitHubClient;
pub use fetcher::RateLimitedFetcher;

/// Well-known directory holding a repository's workflow definitions.
pub const WORKFLOWS_DIR: &str = ".github/workflows";
