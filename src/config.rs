use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Fallbacks used when the keyword list is not configured: the study's
/// data-science vocabulary.
const DEFAULT_KEYWORDS: &str = "machine learning,deep learning,data science,machine-learning,deep-learning,data-science";
const DEFAULT_MIN_SUPPORT: f64 = 0.05;

/// Run configuration loaded from the environment (a `.env` file is
/// honored when present).
///
/// `GITHUB_TOKENS` holds a comma-separated credential list; one worker
/// is started per token. `GITHUB_PERSONAL_ACCESS_TOKEN` is accepted as
/// a single-credential fallback.
#[derive(Debug, Clone)]
pub struct Config {
    pub tokens: Vec<String>,
    pub data_dir: PathBuf,
    pub dumps_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keywords: Vec<String>,
    pub min_support: f64,
    pub activity_months_offset: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let raw_tokens = env::var("GITHUB_TOKENS")
            .or_else(|_| env::var("GITHUB_PERSONAL_ACCESS_TOKEN"))
            .context("GITHUB_TOKENS (or GITHUB_PERSONAL_ACCESS_TOKEN) not set")?;
        let tokens = parse_list(&raw_tokens);
        if tokens.is_empty() {
            bail!("GITHUB_TOKENS is set but contains no credentials");
        }

        let data_dir = PathBuf::from(env::var("MINER_DATA_DIR").unwrap_or_else(|_| "data".into()));
        let dumps_dir =
            PathBuf::from(env::var("MINER_DUMPS_DIR").unwrap_or_else(|_| "dumps".into()));
        let output_dir =
            PathBuf::from(env::var("MINER_OUTPUT_DIR").unwrap_or_else(|_| "output".into()));

        let keywords = parse_list(
            &env::var("MINER_KEYWORDS").unwrap_or_else(|_| DEFAULT_KEYWORDS.to_string()),
        );

        let min_support = match env::var("MINER_MIN_SUPPORT") {
            Ok(raw) => raw
                .parse::<f64>()
                .context("MINER_MIN_SUPPORT is not a number")?,
            Err(_) => DEFAULT_MIN_SUPPORT,
        };

        let activity_months_offset = match env::var("MINER_ACTIVITY_MONTHS") {
            Ok(raw) => Some(
                raw.parse::<u32>()
                    .context("MINER_ACTIVITY_MONTHS is not a month count")?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            tokens,
            data_dir,
            dumps_dir,
            output_dir,
            keywords,
            min_support,
            activity_months_offset,
        })
    }

    /// Creates the data, dumps, and output directories.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.dumps_dir, &self.output_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_trims_and_drops_empties() {
        assert_eq!(parse_list("a, b ,,c"), ["a", "b", "c"]);
        assert!(parse_list("").is_empty());
        assert!(parse_list(" , ").is_empty());
    }

    #[test]
    fn blank_token_list_is_rejected() {
        std::env::set_var("GITHUB_TOKENS", " , ");
        let result = Config::from_env();
        std::env::remove_var("GITHUB_TOKENS");
        assert!(result.is_err());
    }
}
