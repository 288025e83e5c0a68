use std::sync::LazyLock;

use regex::Regex;

use crate::error::ModelError;

static ACTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+/[^@]+$").expect("hardcoded regex is valid"));
static DOCKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)docker").expect("hardcoded regex is valid"));

/// A reusable action referenced by a workflow step's `uses:` value,
/// split into its `owner/name` part and an optional `@ref` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReference {
    slug: String,
    name: String,
    slug_without_tag: String,
    tag: String,
    is_docker_related: bool,
}

impl ActionReference {
    /// Parses a raw `uses:` value of the form `owner/name[@ref]`.
    ///
    /// The tag is separated at the *last* `@`, so refs containing `@`
    /// in the owner/name part never confuse the split.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let (without_tag, tag) = match raw.rfind('@') {
            Some(idx) => (&raw[..idx], raw[idx..].to_string()),
            None => (raw, String::new()),
        };

        if !ACTION_REGEX.is_match(without_tag) {
            return Err(ModelError::InvalidActionReference(raw.to_string()));
        }

        let name = without_tag
            .rsplit('/')
            .next()
            .unwrap_or(without_tag)
            .to_string();

        Ok(Self {
            slug: raw.to_string(),
            name,
            slug_without_tag: without_tag.to_string(),
            tag,
            is_docker_related: DOCKER_REGEX.is_match(raw),
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug_without_tag(&self) -> &str {
        &self.slug_without_tag
    }

    /// The version tag including its leading `@`, or the empty string
    /// when the reference is untagged.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_docker_related(&self) -> bool {
        self.is_docker_related
    }
}
