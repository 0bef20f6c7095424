//! Drive extraction, planning and application over a batch of build configs.

use crate::classifier::ImageClassifier;
use crate::descriptor::{BuildConfigDescriptor, Extractor};
use crate::planner::{PatchPlan, PatchPlanner, SkipReason};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thoth_s2i_common::{Error, ImageReference, Result};
use thoth_s2i_schema::{ImageStreamIndex, RawResource, TemplateSet};
use tracing::{debug, error, info, warn};

/// Where patched build configs go.
#[async_trait]
pub trait MigrationTarget: Send + Sync {
    /// Persist the patched build config.
    async fn apply_build_config(
        &self,
        name: &str,
        namespace: Option<&str>,
        resource: &RawResource,
    ) -> Result<()>;

    /// Make `image` available as an image stream tag in `namespace`.
    async fn import_image(&self, image: &ImageReference, namespace: Option<&str>) -> Result<()>;

    async fn trigger_build(&self, name: &str, namespace: Option<&str>) -> Result<()>;
}

/// A live cluster: lists resources and accepts patched ones.
#[async_trait]
pub trait ClusterQuery: MigrationTarget {
    async fn list_build_configs(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<RawResource>>;

    async fn list_image_streams(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<RawResource>>;
}

#[async_trait]
impl MigrationTarget for TemplateSet {
    async fn apply_build_config(
        &self,
        name: &str,
        _namespace: Option<&str>,
        resource: &RawResource,
    ) -> Result<()> {
        debug!("Writing back build config {}", name);
        self.write_back(resource)
    }

    async fn import_image(&self, image: &ImageReference, _namespace: Option<&str>) -> Result<()> {
        warn!(
            "Templates cannot import images, make sure image stream {} exists for {}",
            image.image_stream_tag(),
            image
        );
        Ok(())
    }

    async fn trigger_build(&self, name: &str, _namespace: Option<&str>) -> Result<()> {
        warn!("Templates cannot trigger builds, not triggering build for {}", name);
        Ok(())
    }
}

/// Input of a migration run.
pub enum MigrationSource<'a> {
    Cluster {
        client: &'a dyn ClusterQuery,
        namespace: &'a str,
        selector: Option<&'a str>,
    },
    Templates(&'a TemplateSet),
}

/// Behaviour of a migration run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    /// Plan and patch in memory only.
    pub dry_run: bool,
    /// Start a build for patched configs lacking a `ConfigChange` trigger.
    pub trigger_build: bool,
}

#[derive(Debug, Clone)]
pub struct AppliedItem {
    pub descriptor: BuildConfigDescriptor,
    pub plan: PatchPlan,
    /// The build config after patching.
    pub resource: RawResource,
}

#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct FailedItem {
    pub name: String,
    pub error: Error,
}

/// Outcome of a migration run, one entry per input record.
#[derive(Debug)]
pub struct MigrationResult {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub applied: Vec<AppliedItem>,
    pub skipped: Vec<SkippedItem>,
    pub errors: Vec<FailedItem>,
}

impl MigrationResult {
    fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            dry_run,
            started_at: now,
            finished_at: now,
            applied: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.applied.len() + self.skipped.len() + self.errors.len()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> MigrationSummary {
        MigrationSummary {
            dry_run: self.dry_run,
            started_at: self.started_at,
            finished_at: self.finished_at,
            applied: self
                .applied
                .iter()
                .map(|item| AppliedSummary {
                    name: item.descriptor.name.clone(),
                    plan: item.plan.clone(),
                })
                .collect(),
            skipped: self
                .skipped
                .iter()
                .map(|item| SkippedSummary {
                    name: item.name.clone(),
                    reason: item.reason,
                })
                .collect(),
            errors: self
                .errors
                .iter()
                .map(|item| FailedSummary {
                    name: item.name.clone(),
                    error: item.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable view of a [`MigrationResult`].
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub applied: Vec<AppliedSummary>,
    pub skipped: Vec<SkippedSummary>,
    pub errors: Vec<FailedSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedSummary {
    pub name: String,
    pub plan: PatchPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSummary {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSummary {
    pub name: String,
    pub error: String,
}

enum Outcome {
    Applied(Box<AppliedItem>),
    Skipped(SkipReason),
}

/// Runs a migration with a fixed planner.
pub struct Migrator<'a> {
    planner: &'a PatchPlanner,
    classifier: &'a ImageClassifier,
    options: MigrationOptions,
}

impl<'a> Migrator<'a> {
    pub fn new(
        planner: &'a PatchPlanner,
        classifier: &'a ImageClassifier,
        options: MigrationOptions,
    ) -> Self {
        Self {
            planner,
            classifier,
            options,
        }
    }

    /// Migrate every build config of `source`.
    ///
    /// Failing to list the cluster aborts the run; anything else is
    /// recorded per item.
    pub async fn run(&self, source: MigrationSource<'_>) -> Result<MigrationResult> {
        match source {
            MigrationSource::Cluster {
                client,
                namespace,
                selector,
            } => {
                info!("Listing build configs in namespace {}", namespace);
                let build_configs = client.list_build_configs(namespace, selector).await?;
                let image_streams = client.list_image_streams(namespace, None).await?;
                let index = ImageStreamIndex::from_resources(&image_streams);
                debug!(
                    "Found {} build configs and {} image streams in namespace {}",
                    build_configs.len(),
                    index.len(),
                    namespace
                );
                Ok(self
                    .run_resources(build_configs, Some(&index), Some(namespace), client)
                    .await)
            }
            MigrationSource::Templates(templates) => Ok(self
                .run_resources(templates.resources().to_vec(), None, None, templates)
                .await),
        }
    }

    /// Migrate already loaded build configs, applying changes to `target`.
    pub async fn run_resources<T>(
        &self,
        resources: Vec<RawResource>,
        image_streams: Option<&ImageStreamIndex>,
        default_namespace: Option<&str>,
        target: &T,
    ) -> MigrationResult
    where
        T: MigrationTarget + ?Sized,
    {
        let mut result = MigrationResult::new(self.options.dry_run);
        let mut extractor = Extractor::new(self.classifier);
        if let Some(index) = image_streams {
            extractor = extractor.with_image_streams(index);
        }
        let mut imported: HashSet<(String, Option<String>)> = HashSet::new();

        for resource in resources {
            let name = resource.display_name();
            match self
                .process(resource, &extractor, default_namespace, target, &mut imported)
                .await
            {
                Ok(Outcome::Applied(item)) => result.applied.push(*item),
                Ok(Outcome::Skipped(reason)) => {
                    info!("Skipping {}: {}", name, reason);
                    result.skipped.push(SkippedItem { name, reason });
                }
                Err(e) => {
                    error!("Failed to migrate {}: {}", name, e);
                    result.errors.push(FailedItem { name, error: e });
                }
            }
        }

        result.finished_at = Utc::now();
        result
    }

    async fn process<T>(
        &self,
        mut resource: RawResource,
        extractor: &Extractor<'_>,
        default_namespace: Option<&str>,
        target: &T,
        imported: &mut HashSet<(String, Option<String>)>,
    ) -> Result<Outcome>
    where
        T: MigrationTarget + ?Sized,
    {
        let descriptor = extractor.extract(&resource)?;
        let plan = self.planner.plan(&descriptor);
        if let Some(reason) = plan.skip_reason {
            return Ok(Outcome::Skipped(reason));
        }

        plan.apply_to(&mut resource)?;
        let Some(image) = plan.target_image_stream_tag_ref.clone() else {
            return Ok(Outcome::Skipped(SkipReason::NoSourceImage));
        };

        if self.options.dry_run {
            info!(
                "Would patch {} to use {} (dry run)",
                descriptor.name, image
            );
        } else {
            let namespace = descriptor.namespace.as_deref().or(default_namespace);
            info!("Patching {} to use {}", descriptor.name, image);
            target
                .apply_build_config(&descriptor.name, namespace, &resource)
                .await?;

            if plan.requires_image_import {
                let key = (image.to_string(), namespace.map(str::to_string));
                if imported.contains(&key) {
                    debug!("Image {} already imported in this run", image);
                } else {
                    target.import_image(&image, namespace).await?;
                    imported.insert(key);
                }
            }

            if self.options.trigger_build && plan.triggers_build {
                info!("Triggering build for {}", descriptor.name);
                target.trigger_build(&descriptor.name, namespace).await?;
            }
        }

        Ok(Outcome::Applied(Box::new(AppliedItem {
            descriptor,
            plan,
            resource,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ThothEnvTable;
    use crate::filter::ImageStreamTagFilter;
    use crate::planner::PlanOptions;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use thoth_s2i_schema::{LoadOptions, ResourceKind};

    const TARGET: &str = "quay.io/thoth-station/s2i-thoth-ubi8-py36";

    #[derive(Default)]
    struct FakeCluster {
        build_configs: Vec<RawResource>,
        image_streams: Vec<RawResource>,
        fail_listing: bool,
        fail_apply_for: Option<String>,
        calls: Mutex<Vec<String>>,
        applied: Mutex<Vec<RawResource>>,
    }

    impl FakeCluster {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MigrationTarget for FakeCluster {
        async fn apply_build_config(
            &self,
            name: &str,
            namespace: Option<&str>,
            resource: &RawResource,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("apply {} {}", name, namespace.unwrap_or("-")));
            if self.fail_apply_for.as_deref() == Some(name) {
                return Err(Error::Oc {
                    cmd: "oc apply -f -".to_string(),
                    reason: "forbidden".to_string(),
                });
            }
            self.applied.lock().unwrap().push(resource.clone());
            Ok(())
        }

        async fn import_image(&self, image: &ImageReference, namespace: Option<&str>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("import {} {}", image, namespace.unwrap_or("-")));
            Ok(())
        }

        async fn trigger_build(&self, name: &str, namespace: Option<&str>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("build {} {}", name, namespace.unwrap_or("-")));
            Ok(())
        }
    }

    #[async_trait]
    impl ClusterQuery for FakeCluster {
        async fn list_build_configs(
            &self,
            _namespace: &str,
            _selector: Option<&str>,
        ) -> Result<Vec<RawResource>> {
            if self.fail_listing {
                return Err(Error::Oc {
                    cmd: "oc get bc".to_string(),
                    reason: "unauthorized".to_string(),
                });
            }
            Ok(self.build_configs.clone())
        }

        async fn list_image_streams(
            &self,
            _namespace: &str,
            _selector: Option<&str>,
        ) -> Result<Vec<RawResource>> {
            Ok(self.image_streams.clone())
        }
    }

    fn source_build_config(name: &str, from: &str, triggers: Value) -> RawResource {
        RawResource::new(json!({
            "kind": "BuildConfig",
            "metadata": {"name": name, "namespace": "thoth-test"},
            "spec": {
                "strategy": {"type": "Source", "sourceStrategy": {
                    "from": {"kind": "ImageStreamTag", "name": from},
                    "env": [{"name": "THOTH_ADVISE", "value": "0"}]
                }},
                "triggers": triggers
            }
        }))
    }

    fn planner(options: PlanOptions) -> PatchPlanner {
        PatchPlanner::new(TARGET, options, ThothEnvTable::defaults()).unwrap()
    }

    #[tokio::test]
    async fn test_init_job_end_to_end() {
        let cluster = FakeCluster {
            build_configs: vec![source_build_config("init-job", "python-36:latest", json!([]))],
            ..FakeCluster::default()
        };
        let planner = planner(PlanOptions {
            insert_env_vars: true,
            from_image_stream_tag_filter: Some(ImageStreamTagFilter::default()),
            import_image: true,
            ..PlanOptions::default()
        });
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(
            &planner,
            &classifier,
            MigrationOptions {
                dry_run: false,
                trigger_build: true,
            },
        );

        let result = migrator
            .run(MigrationSource::Cluster {
                client: &cluster,
                namespace: "thoth-test",
                selector: None,
            })
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.applied.len(), 1);
        assert_eq!(
            cluster.calls(),
            vec![
                "apply init-job thoth-test".to_string(),
                "import quay.io/thoth-station/s2i-thoth-ubi8-py36:latest thoth-test".to_string(),
                "build init-job thoth-test".to_string(),
            ]
        );

        let applied = cluster.applied.lock().unwrap();
        let source = &applied[0].raw()["spec"]["strategy"]["sourceStrategy"];
        assert_eq!(
            source["from"],
            json!({"kind": "ImageStreamTag", "name": "s2i-thoth-ubi8-py36:latest"})
        );
        assert_eq!(source["env"][0], json!({"name": "THOTH_ADVISE", "value": "0"}));
        assert!(source["env"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|var| var["name"] == "THOTH_ADVISE")
            .count()
            == 1);
    }

    #[tokio::test]
    async fn test_dry_run_calls_nothing() {
        let cluster = FakeCluster {
            build_configs: vec![source_build_config("init-job", "python-36:latest", json!([]))],
            ..FakeCluster::default()
        };
        let planner = planner(PlanOptions {
            import_image: true,
            ..PlanOptions::default()
        });
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(
            &planner,
            &classifier,
            MigrationOptions {
                dry_run: true,
                trigger_build: true,
            },
        );

        let result = migrator
            .run(MigrationSource::Cluster {
                client: &cluster,
                namespace: "thoth-test",
                selector: None,
            })
            .await
            .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.applied.len(), 1);
        assert_eq!(
            result.applied[0].resource.raw()["spec"]["strategy"]["sourceStrategy"]["from"]["name"],
            "s2i-thoth-ubi8-py36:latest"
        );
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_isolation() {
        let cluster = FakeCluster {
            build_configs: vec![
                source_build_config("first", "python-36:latest", json!([{"type": "ConfigChange"}])),
                RawResource::new(json!({"kind": "BuildConfig", "metadata": {}, "spec": {}})),
                source_build_config("third", "python-38:latest", json!([{"type": "ConfigChange"}])),
            ],
            ..FakeCluster::default()
        };
        let planner = planner(PlanOptions::default());
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let result = migrator
            .run(MigrationSource::Cluster {
                client: &cluster,
                namespace: "thoth-test",
                selector: None,
            })
            .await
            .unwrap();

        assert_eq!(result.total(), 3);
        assert_eq!(result.applied.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].name, "<unnamed>");
        assert!(result.errors[0].error.is_malformed_resource());
        assert_eq!(
            cluster.calls(),
            vec![
                "apply first thoth-test".to_string(),
                "apply third thoth-test".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_collaborator_failure_is_per_item() {
        let cluster = FakeCluster {
            build_configs: vec![
                source_build_config("denied", "python-36:latest", json!([])),
                source_build_config("allowed", "python-36:latest", json!([])),
            ],
            fail_apply_for: Some("denied".to_string()),
            ..FakeCluster::default()
        };
        let planner = planner(PlanOptions {
            import_image: true,
            ..PlanOptions::default()
        });
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let result = migrator
            .run_resources(cluster.build_configs.clone(), None, None, &cluster)
            .await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].name, "denied");
        assert_eq!(result.applied.len(), 1);
        assert_eq!(
            cluster.calls(),
            vec![
                "apply denied thoth-test".to_string(),
                "apply allowed thoth-test".to_string(),
                "import quay.io/thoth-station/s2i-thoth-ubi8-py36:latest thoth-test".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_image_imported_once_per_namespace() {
        let cluster = FakeCluster::default();
        let planner = planner(PlanOptions {
            import_image: true,
            ..PlanOptions::default()
        });
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let resources = vec![
            source_build_config("a", "python-36:latest", json!([{"type": "ConfigChange"}])),
            source_build_config("b", "python-38:latest", json!([{"type": "ConfigChange"}])),
        ];
        let result = migrator.run_resources(resources, None, None, &cluster).await;

        assert_eq!(result.applied.len(), 2);
        let imports = cluster
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("import"))
            .count();
        assert_eq!(imports, 1);
    }

    #[tokio::test]
    async fn test_known_image_stream_skips_import_and_docker_is_skipped() {
        let cluster = FakeCluster {
            build_configs: vec![
                source_build_config("init-job", "python-36:latest", json!([{"type": "ConfigChange"}])),
                RawResource::new(json!({
                    "kind": "BuildConfig",
                    "metadata": {"name": "docker-app"},
                    "spec": {"strategy": {"type": "Docker"}}
                })),
            ],
            image_streams: vec![RawResource::new(json!({
                "kind": "ImageStream",
                "metadata": {"name": "s2i-thoth-ubi8-py36"},
                "spec": {"tags": [{"name": "latest"}]}
            }))],
            ..FakeCluster::default()
        };
        let planner = planner(PlanOptions {
            import_image: true,
            ..PlanOptions::default()
        });
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let result = migrator
            .run(MigrationSource::Cluster {
                client: &cluster,
                namespace: "thoth-test",
                selector: None,
            })
            .await
            .unwrap();

        assert_eq!(result.applied.len(), 1);
        assert!(!result.applied[0].plan.requires_image_import);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::NotSourceStrategy);
        assert_eq!(cluster.calls(), vec!["apply init-job thoth-test".to_string()]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let cluster = FakeCluster {
            fail_listing: true,
            ..FakeCluster::default()
        };
        let planner = planner(PlanOptions::default());
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let result = migrator
            .run(MigrationSource::Cluster {
                client: &cluster,
                namespace: "thoth-test",
                selector: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let cluster = FakeCluster::default();
        let planner = planner(PlanOptions {
            insert_env_vars: true,
            ..PlanOptions::default()
        });
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let first = migrator
            .run_resources(
                vec![source_build_config("init-job", "python-36:latest", json!([]))],
                None,
                None,
                &cluster,
            )
            .await;
        let patched = first.applied[0].resource.clone();

        let second = migrator
            .run_resources(vec![patched], None, None, &cluster)
            .await;
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped[0].reason, SkipReason::AlreadyThoth);
    }

    #[tokio::test]
    async fn test_templates_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.yaml");
        std::fs::write(
            &path,
            r#"
kind: Template
apiVersion: template.openshift.io/v1
objects:
  - kind: BuildConfig
    metadata:
      name: init-job
    spec:
      strategy:
        type: Source
        sourceStrategy:
          from:
            kind: ImageStreamTag
            name: python-36:latest
"#,
        )
        .unwrap();

        let templates =
            TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default()).unwrap();
        let planner = planner(PlanOptions::default());
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let result = migrator
            .run(MigrationSource::Templates(&templates))
            .await
            .unwrap();
        assert_eq!(result.applied.len(), 1);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("s2i-thoth-ubi8-py36:latest"));
        assert!(!written.contains("python-36:latest"));
    }

    #[tokio::test]
    async fn test_summary_serializes() {
        let cluster = FakeCluster::default();
        let planner = planner(PlanOptions::default());
        let classifier = ImageClassifier::default();
        let migrator = Migrator::new(&planner, &classifier, MigrationOptions::default());

        let result = migrator
            .run_resources(
                vec![RawResource::new(json!({
                    "metadata": {"name": "docker-app"},
                    "spec": {"strategy": {"type": "Docker"}}
                }))],
                None,
                None,
                &cluster,
            )
            .await;
        let summary = serde_json::to_value(result.summary()).unwrap();
        assert_eq!(summary["skipped"][0]["reason"], "not_source_strategy");
        assert_eq!(summary["applied"], json!([]));
    }
}
