//! Container image references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag assumed when a reference carries neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// Tag or digest part of an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TagOrDigest {
    Tag(String),
    Digest(String),
}

/// A parsed `[registry/]repository[:tag|@digest]` image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageReference {
    registry: Option<String>,
    repository: String,
    tag_or_digest: TagOrDigest,
}

impl ImageReference {
    /// Parse an image reference.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let invalid = |reason: &str| crate::Error::ImageReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("image reference cannot be empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("image reference cannot contain whitespace"));
        }

        let (without_digest, digest) = match trimmed.split_once('@') {
            Some((_, "")) => return Err(invalid("empty digest")),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (trimmed, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            Some((_, after)) if after.contains('/') => (without_digest, None),
            Some((_, "")) => return Err(invalid("empty tag")),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (without_digest, None),
        };

        let (registry, repository) = match without_tag.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest.to_string())
            }
            _ => (None, without_tag.to_string()),
        };

        if repository.is_empty() {
            return Err(invalid("repository cannot be empty"));
        }
        if repository.split('/').any(str::is_empty) {
            return Err(invalid("repository has an empty path component"));
        }

        let tag_or_digest = match (digest, tag) {
            (Some(digest), _) => TagOrDigest::Digest(digest),
            (None, Some(tag)) => TagOrDigest::Tag(tag),
            (None, None) => TagOrDigest::Tag(DEFAULT_TAG.to_string()),
        };

        Ok(Self {
            registry,
            repository,
            tag_or_digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.tag_or_digest {
            TagOrDigest::Tag(tag) => Some(tag),
            TagOrDigest::Digest(_) => None,
        }
    }

    pub fn digest(&self) -> Option<&str> {
        match &self.tag_or_digest {
            TagOrDigest::Tag(_) => None,
            TagOrDigest::Digest(digest) => Some(digest),
        }
    }

    /// The same image with `tag` in place of the current tag or digest.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag_or_digest: TagOrDigest::Tag(tag.to_string()),
        }
    }

    /// Registry and repository without tag or digest.
    pub fn name(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.repository),
            None => self.repository.clone(),
        }
    }

    /// Last repository path component, used as the image stream name.
    pub fn image_stream_name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository)
    }

    /// `<image stream name>:<tag>` as referenced by an `ImageStreamTag`.
    pub fn image_stream_tag(&self) -> String {
        format!(
            "{}:{}",
            self.image_stream_name(),
            self.tag().unwrap_or(DEFAULT_TAG)
        )
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.repository)?;
        match &self.tag_or_digest {
            TagOrDigest::Tag(tag) => write!(f, ":{}", tag),
            TagOrDigest::Digest(digest) => write!(f, "@{}", digest),
        }
    }
}

impl FromStr for ImageReference {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageReference {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageReference> for String {
    fn from(value: ImageReference) -> Self {
        value.to_string()
    }
}
