//! `ImageStream` views and a name index used to resolve image stream tags.

use crate::RawResource;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use thoth_s2i_common::{Error, Result};
use tracing::{debug, warn};

/// The subset of an `ImageStream` object inspected by thoth-s2i.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageStreamView {
    pub metadata: crate::buildconfig::ObjectMeta,
    pub spec: ImageStreamSpec,
    pub status: ImageStreamStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageStreamSpec {
    pub tags: Vec<TagReference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TagReference {
    pub name: Option<String>,
    pub from: Option<crate::ObjectReference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageStreamStatus {
    pub tags: Vec<NamedTagEventList>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NamedTagEventList {
    pub tag: Option<String>,
    pub items: Vec<TagEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagEvent {
    pub docker_image_reference: Option<String>,
}

impl ImageStreamView {
    pub fn from_resource(resource: &RawResource) -> Result<Self> {
        Self::deserialize(resource.raw())
            .map_err(|e| Error::malformed(resource.display_name(), e.to_string()))
    }

    /// Image a tag points to: the declared `from` image, else the newest
    /// image recorded in the status.
    pub fn resolve_tag(&self, tag: &str) -> Option<String> {
        let declared = self
            .spec
            .tags
            .iter()
            .find(|record| record.name.as_deref() == Some(tag))
            .and_then(|record| record.from.as_ref())
            .filter(|from| from.kind.as_deref() != Some("ImageStreamTag"))
            .and_then(|from| from.name.clone());

        declared.or_else(|| {
            self.status
                .tags
                .iter()
                .find(|record| record.tag.as_deref() == Some(tag))
                .and_then(|record| record.items.first())
                .and_then(|event| event.docker_image_reference.clone())
        })
    }

    /// All tag names declared in spec or status.
    pub fn tag_names(&self) -> BTreeSet<String> {
        self.spec
            .tags
            .iter()
            .filter_map(|record| record.name.clone())
            .chain(self.status.tags.iter().filter_map(|record| record.tag.clone()))
            .collect()
    }
}

/// Image streams indexed by name.
#[derive(Debug, Clone, Default)]
pub struct ImageStreamIndex {
    streams: BTreeMap<String, ImageStreamView>,
}

impl ImageStreamIndex {
    /// Build the index; unreadable or unnamed streams are logged and skipped.
    pub fn from_resources<'a>(resources: impl IntoIterator<Item = &'a RawResource>) -> Self {
        let mut streams = BTreeMap::new();
        for resource in resources {
            let Some(name) = resource.name().map(str::to_string) else {
                warn!("Skipping image stream without a name");
                continue;
            };
            match ImageStreamView::from_resource(resource) {
                Ok(view) => {
                    debug!("Indexed image stream {}", name);
                    streams.insert(name, view);
                }
                Err(e) => warn!("Skipping image stream {}: {}", name, e),
            }
        }
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Resolve `name:tag` to the image it currently points to.
    pub fn resolve(&self, name: &str, tag: &str) -> Option<String> {
        self.streams.get(name).and_then(|stream| stream.resolve_tag(tag))
    }

    /// Every `name:tag` pair known to the index.
    pub fn image_stream_tags(&self) -> BTreeSet<String> {
        self.streams
            .iter()
            .flat_map(|(name, stream)| {
                stream
                    .tag_names()
                    .into_iter()
                    .map(move |tag| format!("{}:{}", name, tag))
            })
            .collect()
    }
}
