use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// One entry of a repository directory listing from the contents API.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitWindow,
}

/// Remaining quota of one rate-limit window. `reset` is a UTC epoch
/// timestamp as advertised by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitWindow {
    pub remaining: u32,
    pub reset: i64,
}
