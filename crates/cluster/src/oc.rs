//! OpenShift cluster access through the `oc` command line client.

use crate::executor::{Executor, LocalExecutor};
use async_trait::async_trait;
use serde_json::Value;
use thoth_s2i_common::{Error, ImageReference, Result};
use thoth_s2i_core::{ClusterQuery, MigrationTarget};
use thoth_s2i_schema::RawResource;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Client driving `oc`; availability is checked before the first command.
pub struct OcClient<E: Executor = LocalExecutor> {
    executor: E,
    program: String,
    checked: OnceCell<String>,
}

impl OcClient<LocalExecutor> {
    pub fn local() -> Self {
        Self::new(LocalExecutor::new())
    }
}

impl<E: Executor> OcClient<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            program: "oc".to_string(),
            checked: OnceCell::new(),
        }
    }

    /// `oc version` output; runs at most once per client.
    pub async fn version(&self) -> Result<&str> {
        let version = self
            .checked
            .get_or_try_init(|| async {
                let args = vec!["version".to_string()];
                let output = self.executor.execute(&self.program, &args, None).await?;
                if !output.success() {
                    return Err(Error::Oc {
                        cmd: format!("{} version", self.program),
                        reason: format!(
                            "failed to obtain information about the OpenShift client: {}",
                            output.stderr.trim()
                        ),
                    });
                }
                debug!("OpenShift client: {}", output.stdout.trim());
                Ok::<String, Error>(output.stdout)
            })
            .await?;
        Ok(version.as_str())
    }

    async fn run(&self, args: Vec<String>, stdin: Option<&str>) -> Result<String> {
        self.version().await?;

        let output = self.executor.execute(&self.program, &args, stdin).await?;
        if !output.success() {
            return Err(Error::Oc {
                cmd: format!("{} {}", self.program, args.join(" ")),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// `oc get <kind> --namespace <ns> -o json [-l selector]`, as raw items.
    pub async fn get(&self, kind: &str, namespace: &str, selector: Option<&str>) -> Result<Vec<RawResource>> {
        let mut args = vec![
            "get".to_string(),
            kind.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
            args.push("-l".to_string());
            args.push(selector.to_string());
        }

        let stdout = self.run(args, None).await?;
        let listing: Value = serde_json::from_str(&stdout)?;
        match listing.get("items") {
            Some(Value::Array(items)) => Ok(items.iter().cloned().map(RawResource::new).collect()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(Error::malformed(
                format!("{} listing", kind),
                "items is not a list",
            )),
        }
    }

    pub async fn apply(&self, resource: &RawResource, namespace: Option<&str>) -> Result<()> {
        let mut args = vec!["apply".to_string()];
        if let Some(namespace) = namespace {
            args.push("--namespace".to_string());
            args.push(namespace.to_string());
        }
        args.push("-f".to_string());
        args.push("-".to_string());

        let stdout = self.run(args, Some(&resource.to_json()?)).await?;
        debug!("{}", stdout.trim());
        Ok(())
    }

    pub async fn start_build(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let mut args = vec!["start-build".to_string()];
        if let Some(namespace) = namespace {
            args.push("-n".to_string());
            args.push(namespace.to_string());
        }
        args.push(name.to_string());

        let stdout = self.run(args, None).await?;
        info!("{}", stdout.trim());
        Ok(())
    }

    /// Import `image` as image stream tag `<name>:<tag>` into `namespace`.
    pub async fn import_image_tag(&self, image: &ImageReference, namespace: Option<&str>) -> Result<String> {
        let mut args = vec!["import-image".to_string()];
        if let Some(namespace) = namespace {
            args.push("--namespace".to_string());
            args.push(namespace.to_string());
        }
        args.extend([
            image.image_stream_tag(),
            "--from".to_string(),
            image.to_string(),
            "--confirm".to_string(),
        ]);

        self.run(args, None).await.map_err(|e| match e {
            Error::Oc { reason, .. } => Error::ImportImage {
                image: image.to_string(),
                reason,
            },
            other => other,
        })
    }
}

#[async_trait]
impl<E: Executor> MigrationTarget for OcClient<E> {
    async fn apply_build_config(
        &self,
        name: &str,
        namespace: Option<&str>,
        resource: &RawResource,
    ) -> Result<()> {
        debug!("Applying build config {}", name);
        self.apply(resource, namespace).await
    }

    async fn import_image(&self, image: &ImageReference, namespace: Option<&str>) -> Result<()> {
        info!(
            "Importing image {} into namespace {}",
            image,
            namespace.unwrap_or("<current>")
        );
        let stdout = self.import_image_tag(image, namespace).await?;
        debug!("{}", stdout.trim());
        Ok(())
    }

    async fn trigger_build(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        self.start_build(name, namespace).await
    }
}

#[async_trait]
impl<E: Executor> ClusterQuery for OcClient<E> {
    async fn list_build_configs(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<RawResource>> {
        self.get("bc", namespace, selector).await
    }

    async fn list_image_streams(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<RawResource>> {
        self.get("is", namespace, selector).await
    }
}
