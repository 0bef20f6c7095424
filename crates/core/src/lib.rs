//! Core logic of thoth-s2i.
//!
//! Classifies builder images, describes build configs, plans the patch that
//! moves a build config to a Thoth s2i image and drives a migration over a
//! cluster namespace or a set of template files.

pub mod catalog;
pub mod classifier;
pub mod descriptor;
pub mod env;
pub mod filter;
pub mod orchestrator;
pub mod planner;
pub mod report;

pub use catalog::{ThothImageCatalog, DEFAULT_THOTH_S2I_IMAGE, THOTH_S2I_README_URL};
pub use classifier::{classify, Classification, ImageClassifier};
pub use descriptor::{
    extract, BuildConfigDescriptor, BuildStrategy, EnvVar, Extractor, SourceKind, TriggerType,
};
pub use env::ThothEnvTable;
pub use filter::{ImageStreamTagFilter, DEFAULT_IMAGE_STREAM_TAG_FILTER};
pub use orchestrator::{
    ClusterQuery, MigrationOptions, MigrationResult, MigrationSource, MigrationTarget, Migrator,
};
pub use planner::{PatchPlan, PatchPlanner, PlanOptions, SkipReason};
