//! Catalog of published Thoth s2i images.

use regex::Regex;
use std::sync::LazyLock;
use thoth_s2i_common::{Error, ImageReference, Result};

/// Where the list of Thoth s2i images is published.
pub const THOTH_S2I_README_URL: &str =
    "https://raw.githubusercontent.com/thoth-station/s2i-thoth/master/README.rst";

/// Environment variable overriding [`THOTH_S2I_README_URL`].
pub const THOTH_S2I_README_ENV: &str = "THOTH_S2I_README";

/// Image used when none is configured.
pub const DEFAULT_THOTH_S2I_IMAGE: &str = "quay.io/thoth-station/s2i-thoth-ubi8-py36";

static THOTH_IMAGE_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"quay\.io/thoth-station/s2i-thoth-[A-Za-z0-9._-]*[A-Za-z0-9]").unwrap()
});

/// Known Thoth s2i image names, without tags, sorted in descending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThothImageCatalog {
    images: Vec<String>,
}

impl ThothImageCatalog {
    pub fn new(images: impl IntoIterator<Item = String>) -> Self {
        let mut images: Vec<String> = images.into_iter().collect();
        images.sort_unstable_by(|a, b| b.cmp(a));
        images.dedup();
        Self { images }
    }

    /// Scan README text for image names.
    pub fn from_readme(text: &str) -> Self {
        Self::new(
            THOTH_IMAGE_IN_TEXT
                .find_iter(text)
                .map(|m| m.as_str().to_string()),
        )
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Whether the image name (registry and repository, tag ignored) is listed.
    pub fn contains(&self, image: &ImageReference) -> bool {
        self.contains_name(&image.name())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.images.iter().any(|image| image == name)
    }

    /// Fail with the list of available images when `image` is unknown.
    pub fn check(&self, image: &ImageReference) -> Result<()> {
        if self.contains(image) {
            return Ok(());
        }
        Err(Error::Catalog(format!(
            "image {} not found in Thoth's s2i images, available are: {}",
            image,
            self.images.join(", ")
        )))
    }
}
