//! thoth-s2i - Inspect OpenShift s2i builds and migrate them to Thoth s2i images.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thoth_s2i_cluster::{fetch_catalog, OcClient};
use thoth_s2i_common::{ImageReference, DEFAULT_TAG};
use thoth_s2i_core::catalog::THOTH_S2I_README_ENV;
use thoth_s2i_core::{
    report, ClusterQuery, Extractor, ImageClassifier, ImageStreamTagFilter, MigrationOptions,
    MigrationResult, MigrationSource, Migrator, PatchPlanner, PlanOptions, ThothEnvTable,
    ThothImageCatalog, DEFAULT_IMAGE_STREAM_TAG_FILTER, DEFAULT_THOTH_S2I_IMAGE,
    THOTH_S2I_README_URL,
};
use thoth_s2i_schema::{ImageStreamIndex, LoadOptions, ResourceKind, TemplateSet};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "thoth-s2i")]
#[command(
    author,
    version,
    about = "Inspect OpenShift s2i builds and migrate them to Thoth s2i images"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
    Yaml,
    Text,
}

#[derive(Args)]
struct CatalogArgs {
    /// URL of the s2i-thoth README listing the published images
    #[arg(long, env = THOTH_S2I_README_ENV, default_value = THOTH_S2I_README_URL)]
    readme_url: String,

    /// Do not check the image against the published Thoth s2i images
    #[arg(long)]
    no_check_s2i_thoth: bool,
}

#[derive(Args)]
struct PatchArgs {
    /// Thoth s2i image to switch builds to
    #[arg(long = "s2i-thoth", default_value = DEFAULT_THOTH_S2I_IMAGE)]
    s2i_thoth: String,

    /// Tag of the Thoth s2i image
    #[arg(short, long, default_value = DEFAULT_TAG)]
    tag: String,

    /// Insert Thoth and Thamos environment variables
    #[arg(short = 'e', long)]
    insert_env_vars: bool,

    /// Only patch builds whose source image stream tag matches this glob
    #[arg(short = 'f', long, default_value = DEFAULT_IMAGE_STREAM_TAG_FILTER)]
    from_image_stream_tag: String,

    /// Only print what would be changed
    #[arg(long)]
    dry_run: bool,

    /// Output format of the summary
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    output_format: OutputFormat,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Print thoth-s2i version
    Version,

    /// List available Thoth s2i images
    Images {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output_format: OutputFormat,

        /// URL of the s2i-thoth README listing the published images
        #[arg(long, env = THOTH_S2I_README_ENV, default_value = THOTH_S2I_README_URL)]
        readme_url: String,
    },

    /// Import Thoth s2i images into a namespace
    ImportImage {
        /// Images to import, e.g. quay.io/thoth-station/s2i-thoth-ubi8-py36:v0.8.0
        #[arg(value_name = "IMAGE")]
        images: Vec<String>,

        /// Namespace to import images into
        #[arg(short, long, env = "THOTH_S2I_NAMESPACE")]
        namespace: String,

        /// Import the latest version of every published Thoth s2i image
        #[arg(short, long, conflicts_with = "images")]
        all_latest: bool,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Report s2i usage of build configs in a namespace
    Report {
        /// Namespace to inspect
        #[arg(short, long, env = "THOTH_S2I_NAMESPACE")]
        namespace: String,

        /// Label selector for build configs
        #[arg(short = 'l', long)]
        selector: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output_format: OutputFormat,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Patch build configs in template files
    Patch {
        /// Template file or directory
        path: PathBuf,

        #[command(flatten)]
        patch: PatchArgs,
    },

    /// Migrate build configs in a namespace
    Migrate {
        /// Namespace to migrate
        #[arg(short, long, env = "THOTH_S2I_NAMESPACE")]
        namespace: String,

        /// Label selector for build configs
        #[arg(short = 'l', long)]
        selector: Option<String>,

        /// Start a build for patched build configs without a ConfigChange trigger
        #[arg(long)]
        trigger_build: bool,

        /// Do not import the Thoth s2i image into the namespace
        #[arg(long)]
        no_import_image: bool,

        #[command(flatten)]
        patch: PatchArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Version => {
            println!("thoth-s2i: {}", env!("CARGO_PKG_VERSION"));
        }

        Commands::Images {
            output_format,
            readme_url,
        } => {
            let catalog = fetch_catalog(&readme_url).await?;
            print_images(&catalog, output_format)?;
        }

        Commands::ImportImage {
            images,
            namespace,
            all_latest,
            catalog,
        } => {
            if images.is_empty() && !all_latest {
                bail!("No images to import, list images or pass --all-latest");
            }

            let images = if all_latest {
                let published = fetch_catalog(&catalog.readme_url).await?;
                published
                    .images()
                    .iter()
                    .map(|name| ImageReference::parse(name))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                let images = images
                    .iter()
                    .map(|image| ImageReference::parse(image))
                    .collect::<Result<Vec<_>, _>>()?;
                if !catalog.no_check_s2i_thoth {
                    let published = fetch_catalog(&catalog.readme_url).await?;
                    for image in &images {
                        published.check(image)?;
                    }
                }
                images
            };

            let client = OcClient::local();
            for image in &images {
                info!("Importing {} into namespace {}", image, namespace);
                let output = client.import_image_tag(image, Some(&namespace)).await?;
                println!("{}", output.trim_end());
            }
        }

        Commands::Report {
            namespace,
            selector,
            output_format,
            catalog,
        } => {
            let classifier = load_classifier(&catalog).await?;
            run_report(&namespace, selector.as_deref(), &classifier, output_format).await?;
        }

        Commands::Patch { path, patch } => {
            let (planner, classifier) = prepare(&patch, false).await?;
            let templates =
                TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
                    .with_context(|| format!("Failed to load templates from {:?}", path))?;
            if templates.is_empty() {
                warn!("No build configs found in {:?}", path);
            }

            let migrator = Migrator::new(
                &planner,
                &classifier,
                MigrationOptions {
                    dry_run: patch.dry_run,
                    trigger_build: false,
                },
            );
            let result = migrator.run(MigrationSource::Templates(&templates)).await?;
            if let Some(reminder) = report::image_stream_reminder(&result, planner.target()) {
                warn!("{}", reminder);
            }
            finish(&result, patch.output_format)?;
        }

        Commands::Migrate {
            namespace,
            selector,
            trigger_build,
            no_import_image,
            patch,
        } => {
            let (planner, classifier) = prepare(&patch, !no_import_image).await?;
            let client = OcClient::local();

            let migrator = Migrator::new(
                &planner,
                &classifier,
                MigrationOptions {
                    dry_run: patch.dry_run,
                    trigger_build,
                },
            );
            let result = migrator
                .run(MigrationSource::Cluster {
                    client: &client,
                    namespace: &namespace,
                    selector: selector.as_deref(),
                })
                .await
                .with_context(|| format!("Failed to migrate namespace {}", namespace))?;
            finish(&result, patch.output_format)?;
        }
    }

    Ok(())
}

fn print_images(catalog: &ThothImageCatalog, output_format: OutputFormat) -> Result<()> {
    let listing = serde_json::json!({ "s2i_thoth": catalog.images() });
    match output_format {
        OutputFormat::Pretty | OutputFormat::Text => {
            for image in catalog.images() {
                println!("{}", image);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&listing)?),
    }
    Ok(())
}

/// Build the planner and the classifier shared by `patch` and `migrate`.
async fn prepare(patch: &PatchArgs, import_image: bool) -> Result<(PatchPlanner, ImageClassifier)> {
    let options = PlanOptions {
        insert_env_vars: patch.insert_env_vars,
        from_image_stream_tag_filter: Some(ImageStreamTagFilter::new(&patch.from_image_stream_tag)?),
        tag: patch.tag.clone(),
        import_image,
    };
    let planner = PatchPlanner::new(&patch.s2i_thoth, options, ThothEnvTable::from_process_env())
        .context("Invalid Thoth s2i image")?;

    let classifier = load_classifier(&patch.catalog).await?;
    if !patch.catalog.no_check_s2i_thoth {
        classifier.catalog().check(planner.target())?;
    }

    if patch.dry_run {
        warn!("Dry run, no changes will be applied");
    }
    Ok((planner, classifier))
}

/// Classifier aware of the published Thoth s2i images unless the lookup is disabled.
async fn load_classifier(catalog: &CatalogArgs) -> Result<ImageClassifier> {
    if catalog.no_check_s2i_thoth {
        return Ok(ImageClassifier::default());
    }
    let published = fetch_catalog(&catalog.readme_url).await?;
    Ok(ImageClassifier::with_catalog(published))
}

async fn run_report(
    namespace: &str,
    selector: Option<&str>,
    classifier: &ImageClassifier,
    output_format: OutputFormat,
) -> Result<()> {
    let client = OcClient::local();
    let build_configs = client.list_build_configs(namespace, selector).await?;
    if build_configs.is_empty() {
        bail!("No build configs found in namespace {}", namespace);
    }
    let image_streams = client.list_image_streams(namespace, None).await?;
    let index = ImageStreamIndex::from_resources(&image_streams);

    let extractor = Extractor::new(classifier).with_image_streams(&index);

    let mut descriptors = Vec::new();
    let mut failures = 0;
    for resource in &build_configs {
        match extractor.extract(resource) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => {
                error!("Skipping {}: {}", resource.display_name(), e);
                failures += 1;
            }
        }
    }

    match output_format {
        OutputFormat::Pretty | OutputFormat::Text => print!("{}", report::render(&descriptors)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&descriptors)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&descriptors)?),
    }

    if failures > 0 {
        bail!("{} build configs could not be read", failures);
    }
    Ok(())
}

/// Print the outcome of a migration and fail when any item failed.
fn finish(result: &MigrationResult, output_format: OutputFormat) -> Result<()> {
    match output_format {
        OutputFormat::Pretty | OutputFormat::Text => {
            if result.dry_run {
                let documents = result
                    .applied
                    .iter()
                    .map(|item| item.resource.to_yaml())
                    .collect::<Result<Vec<_>, _>>()?;
                if !documents.is_empty() {
                    println!("{}", documents.join("---\n"));
                }
            }
            print!("{}", report::render_summary(result));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.summary())?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&result.summary())?),
    }

    let elapsed = result.finished_at - result.started_at;
    info!(
        "Processed {} build configs in {} ms",
        result.total(),
        elapsed.num_milliseconds()
    );

    if !result.is_success() {
        bail!("{} build configs failed to migrate", result.errors.len());
    }
    Ok(())
}
