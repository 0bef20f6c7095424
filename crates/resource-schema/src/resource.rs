//! Raw OpenShift resource records.

use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of an OpenShift object, as declared by its `kind` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BuildConfig,
    ImageStream,
    Template,
    List,
    Other(String),
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::BuildConfig => write!(f, "BuildConfig"),
            ResourceKind::ImageStream => write!(f, "ImageStream"),
            ResourceKind::Template => write!(f, "Template"),
            ResourceKind::List => write!(f, "List"),
            ResourceKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "buildconfig" => ResourceKind::BuildConfig,
            "imagestream" => ResourceKind::ImageStream,
            "template" => ResourceKind::Template,
            "list" => ResourceKind::List,
            _ => ResourceKind::Other(s.trim().to_string()),
        })
    }
}

/// One step from a document root towards a nested object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Where a resource was loaded from, so it can be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOrigin {
    /// Source file.
    pub file: PathBuf,
    /// Index of the YAML document within the file.
    pub document: usize,
    /// Path from the document root to the object.
    pub path: Vec<PathSegment>,
}

/// An untyped OpenShift object together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResource {
    raw: Value,
    origin: Option<ResourceOrigin>,
}

impl RawResource {
    pub fn new(raw: Value) -> Self {
        Self { raw, origin: None }
    }

    pub fn with_origin(mut self, origin: ResourceOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut Value {
        &mut self.raw
    }

    pub fn origin(&self) -> Option<&ResourceOrigin> {
        self.origin.as_ref()
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        object_kind(&self.raw)
    }

    pub fn name(&self) -> Option<&str> {
        self.raw
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.raw
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|namespace| !namespace.is_empty())
    }

    /// Name used in logs and error reports, even for unnamed objects.
    pub fn display_name(&self) -> String {
        match (self.name(), &self.origin) {
            (Some(name), _) => name.to_string(),
            (None, Some(origin)) => format!("<unnamed in {}>", origin.file.display()),
            (None, None) => "<unnamed>".to_string(),
        }
    }

    pub fn to_yaml(&self) -> thoth_s2i_common::Result<String> {
        Ok(serde_yaml::to_string(&self.raw)?)
    }

    pub fn to_json(&self) -> thoth_s2i_common::Result<String> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }
}

fn object_kind(value: &Value) -> Option<ResourceKind> {
    value
        .get("kind")
        .and_then(Value::as_str)
        .and_then(|kind| kind.parse().ok())
}

/// Flatten a loaded document into the objects it holds.
///
/// Arrays, `Template` objects (their `objects`) and `List` objects (their
/// `items`) are descended into recursively.
pub fn iter_objects(content: &Value) -> Vec<(Vec<PathSegment>, &Value)> {
    let mut objects = Vec::new();
    collect_objects(content, &mut Vec::new(), &mut objects);
    objects
}

fn collect_objects<'a>(
    content: &'a Value,
    path: &mut Vec<PathSegment>,
    objects: &mut Vec<(Vec<PathSegment>, &'a Value)>,
) {
    match content {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                if item.is_object() || item.is_array() {
                    path.push(PathSegment::Index(index));
                    collect_objects(item, path, objects);
                    path.pop();
                }
            }
        }
        Value::Object(_) => {
            let nested = match object_kind(content) {
                Some(ResourceKind::Template) => Some("objects"),
                Some(ResourceKind::List) => Some("items"),
                _ => None,
            };

            match nested {
                Some(key) => {
                    if let Some(Value::Array(items)) = content.get(key) {
                        path.push(PathSegment::Key(key.to_string()));
                        for (index, item) in items.iter().enumerate() {
                            path.push(PathSegment::Index(index));
                            collect_objects(item, path, objects);
                            path.pop();
                        }
                        path.pop();
                    }
                }
                None => objects.push((path.clone(), content)),
            }
        }
        _ => {}
    }
}

/// Mutable access to the object found at `path` within `document`.
pub fn object_at_mut<'a>(document: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    path.iter().try_fold(document, |current, segment| match segment {
        PathSegment::Key(key) => current.get_mut(key.as_str()),
        PathSegment::Index(index) => current.get_mut(*index),
    })
}
