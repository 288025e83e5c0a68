use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::ModelError;

static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^/\n]+)/([^/\n]+)$").expect("hardcoded regex is valid"));

/// A GitHub repository identifier of the form `owner/name`.
///
/// Equality and hashing follow the canonical string form, so slugs can
/// be used directly as set members and map keys for dedup/resume logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let caps = SLUG_REGEX
            .captures(raw)
            .ok_or_else(|| ModelError::InvalidSlugFormat(raw.to_string()))?;
        Ok(Self {
            owner: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RepoSlug {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
