//! Normalized description of a single `BuildConfig`.

use crate::classifier::ImageClassifier;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use thoth_s2i_common::{Error, ImageReference, Result, DEFAULT_TAG};
use thoth_s2i_schema::{validate_build_config, BuildConfigView, ImageStreamIndex, RawResource};
use tracing::debug;

/// Build strategy declared in `spec.strategy.type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildStrategy {
    Source,
    Docker,
    Custom,
    Pipeline,
    Unknown(String),
}

impl BuildStrategy {
    pub fn from_type(strategy_type: &str) -> Self {
        match strategy_type.to_lowercase().as_str() {
            "source" => BuildStrategy::Source,
            "docker" => BuildStrategy::Docker,
            "custom" => BuildStrategy::Custom,
            "jenkinspipeline" | "pipeline" => BuildStrategy::Pipeline,
            _ => BuildStrategy::Unknown(strategy_type.to_string()),
        }
    }
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStrategy::Source => write!(f, "Source"),
            BuildStrategy::Docker => write!(f, "Docker"),
            BuildStrategy::Custom => write!(f, "Custom"),
            BuildStrategy::Pipeline => write!(f, "JenkinsPipeline"),
            BuildStrategy::Unknown(other) => write!(f, "{}", other),
        }
    }
}

/// Kind of object `sourceStrategy.from` points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    ImageStreamTag,
    ImageStreamImage,
    DockerImage,
    Other(String),
}

impl SourceKind {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "ImageStreamTag" => SourceKind::ImageStreamTag,
            "ImageStreamImage" => SourceKind::ImageStreamImage,
            "DockerImage" => SourceKind::DockerImage,
            other => SourceKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::ImageStreamTag => write!(f, "ImageStreamTag"),
            SourceKind::ImageStreamImage => write!(f, "ImageStreamImage"),
            SourceKind::DockerImage => write!(f, "DockerImage"),
            SourceKind::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Build trigger type from `spec.triggers[].type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerType {
    ConfigChange,
    ImageChange,
    GitHub,
    GitLab,
    Bitbucket,
    Generic,
    Other(String),
}

impl TriggerType {
    pub fn from_type(trigger_type: &str) -> Self {
        match trigger_type.to_lowercase().as_str() {
            "configchange" => TriggerType::ConfigChange,
            "imagechange" => TriggerType::ImageChange,
            "github" => TriggerType::GitHub,
            "gitlab" => TriggerType::GitLab,
            "bitbucket" => TriggerType::Bitbucket,
            "generic" => TriggerType::Generic,
            _ => TriggerType::Other(trigger_type.to_string()),
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::ConfigChange => write!(f, "ConfigChange"),
            TriggerType::ImageChange => write!(f, "ImageChange"),
            TriggerType::GitHub => write!(f, "GitHub"),
            TriggerType::GitLab => write!(f, "GitLab"),
            TriggerType::Bitbucket => write!(f, "Bitbucket"),
            TriggerType::Generic => write!(f, "Generic"),
            TriggerType::Other(other) => write!(f, "{}", other),
        }
    }
}

macro_rules! serialize_as_display {
    ($($ty:ty),*) => {
        $(impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        })*
    };
}

serialize_as_display!(BuildStrategy, SourceKind, TriggerType);

/// A `name=value` environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Everything thoth-s2i needs to know about a build config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildConfigDescriptor {
    pub name: String,
    pub namespace: Option<String>,
    pub strategy: BuildStrategy,
    pub source_kind: Option<SourceKind>,
    pub image_stream_name: Option<String>,
    pub image_stream_tag: Option<String>,
    pub image_stream_namespace: Option<String>,
    pub resolved_image: Option<ImageReference>,
    pub is_s2i: bool,
    pub is_s2i_thoth: bool,
    pub env: Vec<EnvVar>,
    pub triggers: Vec<TriggerType>,
    /// `name:tag` pairs of image streams visible next to this build config.
    #[serde(skip)]
    pub known_image_stream_tags: BTreeSet<String>,
}

impl BuildConfigDescriptor {
    /// `name:tag` of the source image, with the tag defaulting to `latest`.
    pub fn image_stream_tag_ref(&self) -> Option<String> {
        self.image_stream_name.as_ref().map(|name| {
            format!(
                "{}:{}",
                name,
                self.image_stream_tag.as_deref().unwrap_or(DEFAULT_TAG)
            )
        })
    }

    pub fn has_env(&self, name: &str) -> bool {
        self.env.iter().any(|var| var.name == name)
    }

    pub fn has_trigger(&self, trigger: &TriggerType) -> bool {
        self.triggers.contains(trigger)
    }
}

/// Split `sourceStrategy.from.name` into name and optional tag.
fn split_source_name(name: &str) -> (String, Option<String>) {
    if let Some((image, _digest)) = name.split_once('@') {
        return (image.to_string(), None);
    }
    match name.rsplit_once(':') {
        Some((image, tag)) if !tag.contains('/') && !tag.is_empty() => {
            (image.to_string(), Some(tag.to_string()))
        }
        _ => (name.to_string(), None),
    }
}

/// Builds descriptors from raw records.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    classifier: &'a ImageClassifier,
    image_streams: Option<&'a ImageStreamIndex>,
}

impl<'a> Extractor<'a> {
    pub fn new(classifier: &'a ImageClassifier) -> Self {
        Self {
            classifier,
            image_streams: None,
        }
    }

    /// Resolve image stream tags through `index`.
    pub fn with_image_streams(mut self, index: &'a ImageStreamIndex) -> Self {
        self.image_streams = Some(index);
        self
    }

    pub fn extract(&self, resource: &RawResource) -> Result<BuildConfigDescriptor> {
        let display_name = resource.display_name();
        let validation = validate_build_config(resource.raw())
            .map_err(|e| Error::malformed(&display_name, e.to_string()))?;
        if !validation.valid {
            return Err(Error::malformed(&display_name, validation.summary()));
        }

        let view = BuildConfigView::from_resource(resource)?;
        let name = view
            .metadata
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::malformed(&display_name, "metadata.name is required"))?;
        let strategy = view
            .spec
            .strategy
            .as_ref()
            .and_then(|strategy| strategy.strategy_type.as_deref())
            .map(BuildStrategy::from_type)
            .ok_or_else(|| Error::malformed(&display_name, "spec.strategy.type is required"))?;

        let mut descriptor = BuildConfigDescriptor {
            name,
            namespace: view.metadata.namespace.clone().filter(|ns| !ns.is_empty()),
            strategy,
            source_kind: None,
            image_stream_name: None,
            image_stream_tag: None,
            image_stream_namespace: None,
            resolved_image: None,
            is_s2i: false,
            is_s2i_thoth: false,
            env: Vec::new(),
            triggers: view
                .spec
                .triggers
                .iter()
                .filter_map(|trigger| trigger.trigger_type.as_deref())
                .map(TriggerType::from_type)
                .collect(),
            known_image_stream_tags: self
                .image_streams
                .map(ImageStreamIndex::image_stream_tags)
                .unwrap_or_default(),
        };

        if descriptor.strategy != BuildStrategy::Source {
            return Ok(descriptor);
        }
        let Some(source) = view.source_strategy() else {
            return Ok(descriptor);
        };

        descriptor.env = source
            .env
            .iter()
            .map(|var| EnvVar::new(&var.name, var.value.clone().unwrap_or_default()))
            .collect();

        if let Some(from) = &source.from {
            descriptor.source_kind = from.kind.as_deref().map(SourceKind::from_kind);
            descriptor.image_stream_namespace = from.namespace.clone();
            if let Some(from_name) = from.name.as_deref().filter(|name| !name.is_empty()) {
                let (image, tag) = split_source_name(from_name);
                descriptor.image_stream_name = Some(image);
                descriptor.image_stream_tag = tag;
            }
        }

        descriptor.resolved_image = self.resolve_image(&descriptor, &view);

        let stream_classification = descriptor
            .image_stream_name
            .as_deref()
            .map(|name| self.classifier.classify(name))
            .unwrap_or_default();
        let classification = match &descriptor.resolved_image {
            Some(image) => self.classifier.classify(&image.to_string()),
            None => stream_classification,
        };

        // A rewritten `from` is Thoth even while the last resolved image is not.
        descriptor.is_s2i_thoth = classification.is_s2i_thoth || stream_classification.is_s2i_thoth;
        descriptor.is_s2i = classification.is_s2i
            || descriptor.is_s2i_thoth
            || descriptor.image_stream_name.is_some();

        Ok(descriptor)
    }

    fn resolve_image(
        &self,
        descriptor: &BuildConfigDescriptor,
        view: &BuildConfigView,
    ) -> Option<ImageReference> {
        let image_stream_name = descriptor.image_stream_name.as_deref()?;

        let candidate = if descriptor.source_kind == Some(SourceKind::DockerImage) {
            descriptor
                .image_stream_tag
                .as_ref()
                .map(|tag| format!("{}:{}", image_stream_name, tag))
                .or_else(|| Some(image_stream_name.to_string()))
        } else {
            None
        };

        let candidate = candidate
            .or_else(|| {
                self.image_streams.and_then(|index| {
                    index.resolve(
                        image_stream_name,
                        descriptor.image_stream_tag.as_deref().unwrap_or(DEFAULT_TAG),
                    )
                })
            })
            .or_else(|| view.last_triggered_image().map(str::to_string))?;

        match ImageReference::parse(&candidate) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!("Ignoring unresolvable image for {}: {}", descriptor.name, e);
                None
            }
        }
    }
}

/// Extract a descriptor without image stream knowledge.
pub fn extract(resource: &RawResource) -> Result<BuildConfigDescriptor> {
    Extractor::new(&ImageClassifier::default()).extract(resource)
}
