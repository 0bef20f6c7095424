//! Decide whether an image is an s2i builder, and whether it is a Thoth one.

use crate::catalog::ThothImageCatalog;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thoth_s2i_common::ImageReference;

/// Thoth s2i images published by the thoth-station organization.
pub static THOTH_REPOSITORY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(quay\.io/)?thoth-station/s2i-thoth").unwrap());

/// `s2i` as a standalone token somewhere in the image name.
pub static S2I_MARKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[/_.-])s2i([/_.-]|$)").unwrap());

/// Well known builder image families, e.g. `python-36-centos7` or `nodejs`.
pub static S2I_BUILDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(python|nodejs|ruby|perl|php|golang|go-toolset|dotnet|httpd|nginx|java|openjdk)(-\d+(-[a-z0-9]+)?)?(-(rhel|centos|ubi)\d+)?$",
    )
    .unwrap()
});

/// Result of classifying an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_s2i: bool,
    pub is_s2i_thoth: bool,
}

/// Image classifier, optionally aware of the published Thoth catalog.
#[derive(Debug, Clone, Default)]
pub struct ImageClassifier {
    catalog: ThothImageCatalog,
}

impl ImageClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: ThothImageCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ThothImageCatalog {
        &self.catalog
    }

    /// Classify an image reference or image stream name.
    ///
    /// Never fails; anything unrecognized is neither s2i nor Thoth.
    pub fn classify(&self, image: &str) -> Classification {
        let trimmed = image.trim();
        if trimmed.is_empty() {
            return Classification::default();
        }

        let name = match ImageReference::parse(trimmed) {
            Ok(reference) => reference.name(),
            Err(_) => trimmed.to_string(),
        }
        .to_lowercase();
        let last_component = name.rsplit('/').next().unwrap_or(&name);

        let is_s2i_thoth = last_component.starts_with("s2i-thoth")
            || THOTH_REPOSITORY_PATTERN.is_match(&name)
            || self.catalog.contains_name(&name);
        let is_s2i = is_s2i_thoth
            || S2I_MARKER_PATTERN.is_match(&name)
            || S2I_BUILDER_PATTERN.is_match(last_component);

        Classification {
            is_s2i,
            is_s2i_thoth,
        }
    }
}

/// Classify without catalog knowledge.
pub fn classify(image: &str) -> Classification {
    ImageClassifier::default().classify(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thoth() -> Classification {
        Classification {
            is_s2i: true,
            is_s2i_thoth: true,
        }
    }

    fn s2i() -> Classification {
        Classification {
            is_s2i: true,
            is_s2i_thoth: false,
        }
    }

    #[test]
    fn test_thoth_images() {
        assert_eq!(classify("quay.io/thoth-station/s2i-thoth-ubi8-py36:v0.8.0"), thoth());
        assert_eq!(classify("s2i-thoth-ubi8-py38"), thoth());
        assert_eq!(
            classify("image-registry.openshift-image-registry.svc:5000/ns/s2i-thoth-ubi8-py36@sha256:abc"),
            thoth()
        );
    }

    #[test]
    fn test_plain_s2i_builders() {
        assert_eq!(classify("registry.redhat.io/ubi8/python-36:3.6"), s2i());
        assert_eq!(classify("centos/python-36-centos7"), s2i());
        assert_eq!(classify("python"), s2i());
        assert_eq!(classify("nodejs:12"), s2i());
        assert_eq!(classify("registry.access.redhat.com/ubi8/s2i-base"), s2i());
        assert_eq!(classify("openjdk-11-rhel7"), s2i());
    }

    #[test]
    fn test_non_s2i_images() {
        assert_eq!(classify("docker.io/library/postgres:12"), Classification::default());
        assert_eq!(classify("quay.io/thoth-station/thamos"), Classification::default());
        assert_eq!(classify("mypython"), Classification::default());
    }

    #[test]
    fn test_degenerate_inputs_never_fail() {
        assert_eq!(classify(""), Classification::default());
        assert_eq!(classify("   "), Classification::default());
        assert_eq!(classify("not an image"), Classification::default());
    }

    #[test]
    fn test_catalog_membership_marks_thoth() {
        let catalog = ThothImageCatalog::new(vec!["quay.io/acme/custom-builder".to_string()]);
        let classifier = ImageClassifier::with_catalog(catalog);
        assert_eq!(classifier.classify("quay.io/acme/custom-builder:1.0"), thoth());
        assert_eq!(classify("quay.io/acme/custom-builder:1.0"), Classification::default());
    }

    #[test]
    fn test_thoth_implies_s2i() {
        for image in [
            "quay.io/thoth-station/s2i-thoth-ubi8-py36",
            "thoth-station/s2i-thoth-f32-py38:latest",
            "python-36",
            "postgres",
        ] {
            let classification = classify(image);
            assert!(!classification.is_s2i_thoth || classification.is_s2i);
        }
    }
}
