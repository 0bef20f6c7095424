//! OpenShift resource definitions for thoth-s2i.
//!
//! This crate holds raw resource records as loaded from a cluster or from
//! template files, typed views over the `BuildConfig` and `ImageStream`
//! fields thoth-s2i reads, schema validation and template loading.

pub mod buildconfig;
pub mod imagestream;
pub mod resource;
pub mod schema;
pub mod templates;
pub mod validation;

pub use buildconfig::{BuildConfigView, EnvVarSpec, ObjectReference};
pub use imagestream::{ImageStreamIndex, ImageStreamView};
pub use resource::{iter_objects, PathSegment, RawResource, ResourceKind, ResourceOrigin};
pub use templates::{LoadOptions, TemplateSet};
pub use validation::{validate_build_config, ValidationError, ValidationResult};
