use std::collections::HashMap;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tracing::debug;

const MARKETPLACE_BASE: &str = "https://github.com/marketplace/actions";

/// Listing-page metadata of one marketplace action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketplaceMetadata {
    pub available_in_marketplace: bool,
    pub verified_creator: bool,
    pub categories: Vec<String>,
}

/// Scrapes marketplace listing pages for verified-creator status and
/// category tags, memoizing one entry per distinct tag-stripped action
/// slug for the lifetime of the run.
///
/// The cache is not synchronized; lookups are intended for the
/// single-threaded analysis stage only.
pub struct MarketplaceClient {
    client: reqwest::Client,
    cache: HashMap<String, MarketplaceMetadata>,
}

impl MarketplaceClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: HashMap::new(),
        }
    }

    /// Looks up metadata for an action. The cache key is the full
    /// tag-stripped slug so same-named actions from different owners
    /// stay distinct entries; the listing page URL is built from the
    /// action's short name.
    pub async fn lookup(
        &mut self,
        slug_without_tag: &str,
        action_name: &str,
    ) -> Result<MarketplaceMetadata> {
        if let Some(cached) = self.cache.get(slug_without_tag) {
            return Ok(cached.clone());
        }

        let url = format!("{MARKETPLACE_BASE}/{action_name}");
        let response = self
            .client
            .get(&url)
            .header("User-Agent", "actions-miner")
            .send()
            .await
            .with_context(|| format!("cannot fetch marketplace page {url}"))?;

        let metadata = if response.status().is_success() {
            let html = response.text().await?;
            parse_listing_page(&html)
        } else {
            debug!(action = slug_without_tag, status = %response.status(), "not listed in marketplace");
            MarketplaceMetadata::default()
        };

        self.cache
            .insert(slug_without_tag.to_string(), metadata.clone());
        Ok(metadata)
    }
}

impl Default for MarketplaceClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_listing_page(html: &str) -> MarketplaceMetadata {
    let document = Html::parse_document(html);
    let verified_selector =
        Selector::parse("svg.octicon-verified").expect("hardcoded selector is valid");
    let category_selector = Selector::parse("a.topic-tag").expect("hardcoded selector is valid");

    let categories = document
        .select(&category_selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|category| !category.is_empty())
        .collect();

    MarketplaceMetadata {
        available_in_marketplace: true,
        verified_creator: document.select(&verified_selector).next().is_some(),
        categories,
    }
}
