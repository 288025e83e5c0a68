use chrono::{DateTime, Months, TimeZone, Utc};

use crate::error::FetchError;
use crate::github::models::Repository;
use crate::github::RateLimitedFetcher;
use crate::models::RepoSlug;

/// General-availability date of GitHub Actions; the activity cutoff is
/// this date plus a configurable month offset.
fn actions_release_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 13, 0, 0, 0)
        .single()
        .expect("hardcoded date is valid")
}

pub fn acceptance_date(months_offset: u32) -> DateTime<Utc> {
    actions_release_date()
        .checked_add_months(Months::new(months_offset))
        .unwrap_or_else(actions_release_date)
}

/// Outcome of evaluating one repository for inclusion in the study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Selected,
    NoRecentCommit,
    NoKeywordMatch,
}

/// Decides per repository whether it qualifies: optionally at least one
/// commit since the acceptance date, and a keyword match in the
/// repository's topics or description.
#[derive(Debug, Clone)]
pub struct RepositorySelector {
    keywords: Vec<String>,
    accept_after: Option<DateTime<Utc>>,
}

impl RepositorySelector {
    pub fn new(keywords: &[String], activity_months_offset: Option<u32>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            accept_after: activity_months_offset.map(acceptance_date),
        }
    }

    pub async fn evaluate(
        &self,
        fetcher: &RateLimitedFetcher,
        slug: &RepoSlug,
        repo: &Repository,
    ) -> Result<Decision, FetchError> {
        if let Some(cutoff) = self.accept_after {
            if !fetcher.has_commit_since(slug, cutoff).await? {
                return Ok(Decision::NoRecentCommit);
            }
        }
        if self.matches_keywords(repo) {
            Ok(Decision::Selected)
        } else {
            Ok(Decision::NoKeywordMatch)
        }
    }

    fn matches_keywords(&self, repo: &Repository) -> bool {
        let description = repo
            .description
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        self.keywords.iter().any(|keyword| {
            description.contains(keyword)
                || repo
                    .topics
                    .iter()
                    .any(|topic| topic.to_lowercase().contains(keyword))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(description: Option<&str>, topics: &[&str]) -> Repository {
        Repository {
            description: description.map(str::to_string),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn selector(keywords: &[&str]) -> RepositorySelector {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
        RepositorySelector::new(&keywords, None)
    }

    #[test]
    fn matches_keyword_in_description_case_insensitively() {
        let s = selector(&["machine learning"]);
        assert!(s.matches_keywords(&repo(Some("A Machine Learning toolkit"), &[])));
        assert!(!s.matches_keywords(&repo(Some("A web framework"), &[])));
    }

    #[test]
    fn matches_keyword_in_topics() {
        let s = selector(&["data-science"]);
        assert!(s.matches_keywords(&repo(None, &["python", "Data-Science"])));
        assert!(!s.matches_keywords(&repo(None, &["python"])));
    }

    #[test]
    fn missing_description_does_not_match() {
        let s = selector(&["ml"]);
        assert!(!s.matches_keywords(&repo(None, &[])));
    }

    #[test]
    fn acceptance_date_adds_month_offset() {
        let base = acceptance_date(0);
        let shifted = acceptance_date(6);
        assert_eq!(base.to_rfc3339(), "2019-11-13T00:00:00+00:00");
        assert_eq!(shifted.to_rfc3339(), "2020-05-13T00:00:00+00:00");
    }
}
