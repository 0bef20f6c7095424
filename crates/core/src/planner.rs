//! Compute the changes that turn a build config into a Thoth s2i build.

use crate::descriptor::{BuildConfigDescriptor, BuildStrategy, EnvVar, TriggerType};
use crate::env::ThothEnvTable;
use crate::filter::ImageStreamTagFilter;
use serde::Serialize;
use std::fmt;
use thoth_s2i_common::{ImageReference, Result, DEFAULT_TAG};
use thoth_s2i_schema::buildconfig::{append_source_env, set_source_image_stream_tag};
use thoth_s2i_schema::{EnvVarSpec, RawResource};
use tracing::debug;

/// Planner configuration.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Append the Thoth environment table to the build's env.
    pub insert_env_vars: bool,
    /// Only touch build configs whose source `name:tag` matches.
    pub from_image_stream_tag_filter: Option<ImageStreamTagFilter>,
    /// Tag of the Thoth image to use.
    pub tag: String,
    /// Import the Thoth image into the namespace when it is missing there.
    pub import_image: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            insert_env_vars: false,
            from_image_stream_tag_filter: None,
            tag: DEFAULT_TAG.to_string(),
            import_image: false,
        }
    }
}

/// Why a build config is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotSourceStrategy,
    NoSourceImage,
    FilteredOut,
    AlreadyThoth,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotSourceStrategy => write!(f, "not a Source strategy build"),
            SkipReason::NoSourceImage => write!(f, "no source image configured"),
            SkipReason::FilteredOut => write!(f, "source image does not match the filter"),
            SkipReason::AlreadyThoth => write!(f, "already uses a Thoth s2i image"),
        }
    }
}

/// Changes to apply to one build config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchPlan {
    pub target_image_stream_tag_ref: Option<ImageReference>,
    pub env_var_insertions: Vec<EnvVar>,
    pub triggers_build: bool,
    pub requires_image_import: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl PatchPlan {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target_image_stream_tag_ref.is_none()
    }

    /// Rewrite the raw build config according to this plan.
    ///
    /// An empty plan leaves the resource as is.
    pub fn apply_to(&self, resource: &mut RawResource) -> Result<()> {
        let Some(target) = &self.target_image_stream_tag_ref else {
            return Ok(());
        };

        set_source_image_stream_tag(resource, &target.image_stream_tag())?;
        if !self.env_var_insertions.is_empty() {
            let env: Vec<EnvVarSpec> = self
                .env_var_insertions
                .iter()
                .map(|var| EnvVarSpec {
                    name: var.name.clone(),
                    value: Some(var.value.clone()),
                    value_from: None,
                })
                .collect();
            append_source_env(resource, &env)?;
        }
        Ok(())
    }
}

/// Plans patches towards one target Thoth image.
#[derive(Debug, Clone)]
pub struct PatchPlanner {
    target: ImageReference,
    options: PlanOptions,
    env_table: ThothEnvTable,
}

impl PatchPlanner {
    /// Fails when the target image is not a valid image reference.
    pub fn new(target_thoth_image: &str, options: PlanOptions, env_table: ThothEnvTable) -> Result<Self> {
        let target = ImageReference::parse(target_thoth_image)?.with_tag(&options.tag);
        Ok(Self {
            target,
            options,
            env_table,
        })
    }

    /// The target image with the configured tag applied.
    pub fn target(&self) -> &ImageReference {
        &self.target
    }

    pub fn plan(&self, descriptor: &BuildConfigDescriptor) -> PatchPlan {
        if descriptor.strategy != BuildStrategy::Source {
            return PatchPlan::skipped(SkipReason::NotSourceStrategy);
        }

        let Some(source) = descriptor.image_stream_tag_ref() else {
            return PatchPlan::skipped(SkipReason::NoSourceImage);
        };

        if let Some(filter) = &self.options.from_image_stream_tag_filter {
            if !filter.matches(&source) {
                debug!(
                    "Skipping {}: {} does not match filter {}",
                    descriptor.name, source, filter
                );
                return PatchPlan::skipped(SkipReason::FilteredOut);
            }
        }

        if descriptor.is_s2i_thoth {
            return PatchPlan::skipped(SkipReason::AlreadyThoth);
        }

        let env_var_insertions = if self.options.insert_env_vars {
            self.env_table
                .entries()
                .iter()
                .filter(|(name, _)| !descriptor.has_env(name))
                .map(|(name, value)| EnvVar::new(name, value))
                .collect()
        } else {
            Vec::new()
        };

        let requires_image_import = self.options.import_image
            && !descriptor
                .known_image_stream_tags
                .contains(&self.target.image_stream_tag());

        PatchPlan {
            target_image_stream_tag_ref: Some(self.target.clone()),
            env_var_insertions,
            triggers_build: !descriptor.has_trigger(&TriggerType::ConfigChange),
            requires_image_import,
            skip_reason: None,
        }
    }
}
