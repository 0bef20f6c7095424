//! Common error types for thoth-s2i.

use thiserror::Error;

/// Common error type for thoth-s2i operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed resource {resource}: {reason}")]
    MalformedResource { resource: String, reason: String },

    #[error("Invalid image reference {reference:?}: {reason}")]
    ImageReference { reference: String, reason: String },

    #[error("oc command failed: {cmd} - {reason}")]
    Oc { cmd: String, reason: String },

    #[error("Failed to import image {image}: {reason}")]
    ImportImage { image: String, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Image catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::MalformedResource`].
    pub fn malformed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedResource {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error describes a structurally broken resource record.
    pub fn is_malformed_resource(&self) -> bool {
        matches!(self, Error::MalformedResource { .. })
    }
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
