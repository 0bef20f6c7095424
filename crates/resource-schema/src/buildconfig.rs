//! Typed view over the `BuildConfig` fields thoth-s2i reads and writes.

use crate::RawResource;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thoth_s2i_common::{Error, Result};

/// The subset of a `BuildConfig` object inspected by thoth-s2i.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfigView {
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,
    #[serde(deserialize_with = "null_as_default")]
    pub spec: BuildConfigSpec,
    #[serde(deserialize_with = "null_as_default")]
    pub status: BuildConfigStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfigSpec {
    pub strategy: Option<BuildStrategySpec>,
    #[serde(deserialize_with = "null_as_default")]
    pub triggers: Vec<BuildTriggerSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildStrategySpec {
    #[serde(rename = "type")]
    pub strategy_type: Option<String>,
    pub source_strategy: Option<SourceStrategySpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceStrategySpec {
    pub from: Option<ObjectReference>,
    #[serde(deserialize_with = "null_as_default")]
    pub env: Vec<EnvVarSpec>,
}

/// Reference to the builder image (`ImageStreamTag`, `DockerImage`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: Option<String>,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A single environment variable entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildTriggerSpec {
    #[serde(rename = "type")]
    pub trigger_type: Option<String>,
    pub image_change: Option<ImageChangeTriggerSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageChangeTriggerSpec {
    #[serde(rename = "lastTriggeredImageID")]
    pub last_triggered_image_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfigStatus {
    #[serde(deserialize_with = "null_as_default")]
    pub image_change_triggers: Vec<ImageChangeTriggerSpec>,
    pub image: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Templates routinely carry `value: 1` or `value: true`.
fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Bool(value)) => Ok(Some(value.to_string())),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar environment variable value, got {}",
            other
        ))),
    }
}

impl BuildConfigView {
    /// Deserialize the typed view; type mismatches are malformed resources.
    pub fn from_resource(resource: &RawResource) -> Result<Self> {
        Self::deserialize(resource.raw())
            .map_err(|e| Error::malformed(resource.display_name(), e.to_string()))
    }

    pub fn source_strategy(&self) -> Option<&SourceStrategySpec> {
        self.spec
            .strategy
            .as_ref()
            .and_then(|strategy| strategy.source_strategy.as_ref())
    }

    /// The last image a cluster resolved for this build config, if recorded.
    pub fn last_triggered_image(&self) -> Option<&str> {
        self.status
            .image_change_triggers
            .iter()
            .chain(
                self.spec
                    .triggers
                    .iter()
                    .filter_map(|trigger| trigger.image_change.as_ref()),
            )
            .filter_map(|trigger| trigger.last_triggered_image_id.as_deref())
            .find(|image| !image.is_empty())
            .or_else(|| self.status.image.as_deref().filter(|image| !image.is_empty()))
    }
}

/// Point `sourceStrategy.from` of a raw build config at an image stream tag.
pub fn set_source_image_stream_tag(resource: &mut RawResource, image_stream_tag: &str) -> Result<()> {
    let name = resource.display_name();
    let source_strategy = source_strategy_mut(resource.raw_mut())
        .ok_or_else(|| Error::malformed(&name, "no source strategy defined"))?;

    source_strategy.insert(
        "from".to_string(),
        json!({"kind": "ImageStreamTag", "name": image_stream_tag}),
    );
    Ok(())
}

/// Append environment variables to `sourceStrategy.env`.
pub fn append_source_env(resource: &mut RawResource, env: &[EnvVarSpec]) -> Result<()> {
    let name = resource.display_name();
    let source_strategy = source_strategy_mut(resource.raw_mut()).ok_or_else(|| {
        Error::malformed(
            &name,
            "no source strategy defined, cannot inject environment variables",
        )
    })?;

    let entries = source_strategy
        .entry("env")
        .or_insert_with(|| Value::Array(Vec::new()));
    if entries.is_null() {
        *entries = Value::Array(Vec::new());
    }
    let entries = entries
        .as_array_mut()
        .ok_or_else(|| Error::malformed(&name, "sourceStrategy.env is not a list"))?;

    for var in env {
        entries.push(serde_json::to_value(var)?);
    }
    Ok(())
}

fn source_strategy_mut(raw: &mut Value) -> Option<&mut serde_json::Map<String, Value>> {
    raw.pointer_mut("/spec/strategy/sourceStrategy")
        .and_then(Value::as_object_mut)
}
