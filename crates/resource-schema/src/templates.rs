//! Loading OpenShift objects from template files and writing them back.

use crate::resource::{iter_objects, object_at_mut};
use crate::{RawResource, ResourceKind, ResourceOrigin};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thoth_s2i_common::{Error, Result};
use tracing::{debug, error, info, warn};

/// Options controlling how template files are loaded.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Log and skip broken files and objects instead of failing.
    pub skip_errors: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { skip_errors: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }
}

#[derive(Debug)]
struct TemplateFile {
    format: FileFormat,
    content: String,
    documents: Vec<Value>,
}

/// Objects of one kind loaded from a file or a directory tree.
#[derive(Debug)]
pub struct TemplateSet {
    resources: Vec<RawResource>,
    files: Mutex<HashMap<PathBuf, TemplateFile>>,
}

impl TemplateSet {
    /// Load all objects of `kind` found under `path`.
    ///
    /// Directories are walked recursively, following symlinks, in sorted
    /// order. `Template` and `List` objects are flattened.
    pub fn load(path: &Path, kind: ResourceKind, options: &LoadOptions) -> Result<Self> {
        let files = if path.is_file() {
            vec![path.to_path_buf()]
        } else if path.is_dir() {
            let mut files = Vec::new();
            let mut visited = HashSet::new();
            walk_dir(path, &mut files, &mut visited)?;
            files
        } else {
            return Err(Error::Template(format!(
                "Path {:?} is not a file or directory",
                path
            )));
        };

        let mut resources = Vec::new();
        let mut loaded = HashMap::new();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for file in files {
            let Some((content, documents)) = load_file_content(&file, options)? else {
                continue;
            };

            for (document_index, document) in documents.iter().enumerate() {
                for (object_path, object) in iter_objects(document) {
                    let resource = RawResource::new(object.clone()).with_origin(ResourceOrigin {
                        file: file.clone(),
                        document: document_index,
                        path: object_path,
                    });
                    if resource.kind().as_ref() != Some(&kind) {
                        continue;
                    }

                    let Some(name) = resource.name().map(str::to_string) else {
                        let message = format!("No name provided in {} found in {:?}", kind, file);
                        if !options.skip_errors {
                            return Err(Error::Template(message));
                        }
                        error!("{}, skipping...", message);
                        continue;
                    };

                    if let Some(previous) = seen.get(&name) {
                        let message = format!(
                            "Multiple definitions of {} {:?} found in {:?} and {:?}",
                            kind, name, previous, file
                        );
                        if !options.skip_errors {
                            return Err(Error::Template(message));
                        }
                        warn!("{}, skipping...", message);
                        continue;
                    }

                    info!("Found {:?} of kind {} in {:?}", name, kind, file);
                    seen.insert(name, file.clone());
                    resources.push(resource);
                }
            }

            loaded.insert(
                file.clone(),
                TemplateFile {
                    format: FileFormat::for_path(&file),
                    content,
                    documents,
                },
            );
        }

        Ok(Self {
            resources,
            files: Mutex::new(loaded),
        })
    }

    pub fn resources(&self) -> &[RawResource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Replace the object `resource` was loaded from and rewrite its file.
    ///
    /// When only the builder image stream tag changed, the tag is swapped in
    /// the file text and formatting is kept. Any other change re-serializes
    /// the whole file: key order survives, comments do not.
    pub fn write_back(&self, resource: &RawResource) -> Result<()> {
        let origin = resource.origin().ok_or_else(|| {
            Error::Template(format!(
                "{} was not loaded from a template file",
                resource.display_name()
            ))
        })?;

        let mut files = self
            .files
            .lock()
            .map_err(|_| Error::Template("template state lock poisoned".to_string()))?;
        let file = files.get_mut(&origin.file).ok_or_else(|| {
            Error::Template(format!("{:?} is not part of this template set", origin.file))
        })?;

        let target = file
            .documents
            .get_mut(origin.document)
            .and_then(|document| object_at_mut(document, &origin.path))
            .ok_or_else(|| {
                Error::Template(format!(
                    "{} no longer found in {:?}",
                    resource.display_name(),
                    origin.file
                ))
            })?;
        let previous = std::mem::replace(target, resource.raw().clone());

        let edited =
            replace_source_name(&file.content, &previous, resource.raw(), &file.documents);
        let content = match edited {
            Some(content) => content,
            None => {
                warn!(
                    "Formatting of {:?} might change when writing {} back",
                    origin.file,
                    resource.display_name()
                );
                serialize_documents(file)?
            }
        };
        std::fs::write(&origin.file, &content)?;
        file.content = content;
        info!(
            "Wrote {} back to {:?}",
            resource.display_name(),
            origin.file
        );
        Ok(())
    }
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> Result<()> {
    // Symlinks are followed, so guard against directory cycles.
    let canonical = std::fs::canonicalize(dir)?;
    if !visited.insert(canonical) {
        debug!("Already visited {:?}, skipping", dir);
        return Ok(());
    }

    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walk_dir(&entry, files, visited)?;
        } else if entry.is_file() {
            files.push(entry);
        }
    }
    Ok(())
}

/// Parse every YAML/JSON document in a file.
///
/// Returns the raw file text along with the documents, or `None` when the
/// file should be skipped.
fn load_file_content(path: &Path, options: &LoadOptions) -> Result<Option<(String, Vec<Value>)>> {
    info!("Loading file content from {:?}", path);

    let parsed = std::fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|content| parse_documents(&content).map(|documents| (content, documents)));

    let (content, documents) = match parsed {
        Ok(parsed) => parsed,
        Err(e) if options.skip_errors => {
            warn!(
                "Failed to load and/or parse file {:?}, the file will be skipped: {}",
                path, e
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if documents.iter().all(Value::is_null) {
        if !options.skip_errors {
            return Err(Error::Template(format!("File {:?} has value null", path)));
        }
        warn!("File {:?} holds null, skipping...", path);
        return Ok(None);
    }

    if documents
        .iter()
        .any(|document| !(document.is_object() || document.is_array() || document.is_null()))
    {
        let message = format!(
            "File {:?} holds a scalar, does not look like OpenShift YAML/JSON template",
            path
        );
        if !options.skip_errors {
            return Err(Error::Template(message));
        }
        warn!("{}", message);
        return Ok(None);
    }

    Ok(Some((content, documents)))
}

fn parse_documents(content: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        documents.push(Value::deserialize(document)?);
    }
    Ok(documents)
}

const SOURCE_NAME_POINTER: &str = "/spec/strategy/sourceStrategy/from/name";

/// Swap the source image name of one object directly in the file text.
///
/// Each occurrence of the old name is tried in turn; an edit is accepted
/// only if the edited text parses back to exactly `expected`.
fn replace_source_name(
    content: &str,
    previous: &Value,
    updated: &Value,
    expected: &[Value],
) -> Option<String> {
    let old = previous.pointer(SOURCE_NAME_POINTER).and_then(Value::as_str)?;
    let new = updated.pointer(SOURCE_NAME_POINTER).and_then(Value::as_str)?;
    if old.is_empty() || old == new {
        return None;
    }

    content.match_indices(old).find_map(|(start, _)| {
        let mut edited = String::with_capacity(content.len() + new.len());
        edited.push_str(&content[..start]);
        edited.push_str(new);
        edited.push_str(&content[start + old.len()..]);
        match parse_documents(&edited) {
            Ok(documents) if documents == expected => Some(edited),
            _ => None,
        }
    })
}

fn serialize_documents(file: &TemplateFile) -> Result<String> {
    match (file.format, file.documents.as_slice()) {
        (FileFormat::Json, [document]) => {
            let mut content = serde_json::to_string_pretty(document)?;
            content.push('\n');
            Ok(content)
        }
        _ => {
            let documents = file
                .documents
                .iter()
                .map(serde_yaml::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(documents.join("---\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const TEMPLATE: &str = r#"
apiVersion: template.openshift.io/v1
kind: Template
metadata:
  name: thoth-app
objects:
  - kind: BuildConfig
    apiVersion: build.openshift.io/v1
    metadata:
      name: web
    spec:
      strategy:
        type: Source
        sourceStrategy:
          from:
            kind: ImageStreamTag
            name: python-36:latest
  - kind: ImageStream
    apiVersion: image.openshift.io/v1
    metadata:
      name: python-36
  - kind: BuildConfig
    apiVersion: build.openshift.io/v1
    metadata:
      name: worker
    spec:
      strategy:
        type: Docker
"#;

    const LIST: &str = r#"{
  "kind": "List",
  "items": [
    {"kind": "BuildConfig", "metadata": {"name": "api"}, "spec": {"strategy": {"type": "Source"}}}
  ]
}"#;

    #[test]
    fn test_load_directory_recursively() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("template.yaml"), TEMPLATE).unwrap();
        std::fs::write(dir.path().join("nested").join("list.json"), LIST).unwrap();

        let set =
            TemplateSet::load(dir.path(), ResourceKind::BuildConfig, &LoadOptions::default())
                .unwrap();
        let names: Vec<_> = set.resources().iter().filter_map(|r| r.name()).collect();
        assert_eq!(names, vec!["api", "web", "worker"]);

        let streams =
            TemplateSet::load(dir.path(), ResourceKind::ImageStream, &LoadOptions::default())
                .unwrap();
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn test_load_no_objects_of_kind() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("list.json"), LIST).unwrap();

        let set =
            TemplateSet::load(dir.path(), ResourceKind::ImageStream, &LoadOptions::default())
                .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_duplicates_are_skipped_or_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), TEMPLATE).unwrap();
        std::fs::write(dir.path().join("b.yaml"), TEMPLATE).unwrap();

        let set =
            TemplateSet::load(dir.path(), ResourceKind::BuildConfig, &LoadOptions::default())
                .unwrap();
        assert_eq!(set.len(), 2);

        let strict = LoadOptions { skip_errors: false };
        assert!(TemplateSet::load(dir.path(), ResourceKind::BuildConfig, &strict).is_err());
    }

    #[test]
    fn test_null_and_scalar_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("empty.yaml"), "~\n").unwrap();
        std::fs::write(dir.path().join("README"), "just some text\n").unwrap();

        let set =
            TemplateSet::load(dir.path(), ResourceKind::BuildConfig, &LoadOptions::default())
                .unwrap();
        assert!(set.is_empty());

        let strict = LoadOptions { skip_errors: false };
        assert!(
            TemplateSet::load(&dir.path().join("README"), ResourceKind::BuildConfig, &strict)
                .is_err()
        );
    }

    #[test]
    fn test_missing_path() {
        let dir = tempdir().unwrap();
        let result = TemplateSet::load(
            &dir.path().join("missing"),
            ResourceKind::BuildConfig,
            &LoadOptions::default(),
        );
        assert!(matches!(result, Err(Error::Template(_))));
    }

    #[test]
    fn test_multi_document_yaml() {
        let dir = tempdir().unwrap();
        let content = "kind: BuildConfig\nmetadata:\n  name: one\n---\nkind: BuildConfig\nmetadata:\n  name: two\n";
        std::fs::write(dir.path().join("bc.yaml"), content).unwrap();

        let set =
            TemplateSet::load(dir.path(), ResourceKind::BuildConfig, &LoadOptions::default())
                .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.resources()[1].origin().unwrap().document, 1);
    }

    #[test]
    fn test_write_back_replaces_object_in_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("template.yaml");
        std::fs::write(&path, TEMPLATE).unwrap();

        let set = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        let mut web = set.resources()[0].clone();
        web.raw_mut()["spec"]["strategy"]["sourceStrategy"]["from"]["name"] =
            json!("s2i-thoth-ubi8-py36:latest");
        set.write_back(&web).unwrap();

        let reloaded = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.resources()[0].raw()["spec"]["strategy"]["sourceStrategy"]["from"]["name"],
            "s2i-thoth-ubi8-py36:latest"
        );
        let streams = TemplateSet::load(&path, ResourceKind::ImageStream, &LoadOptions::default())
            .unwrap();
        assert_eq!(streams.len(), 1);
    }

    const COMMENTED: &str = r#"# Managed by ops, edit with care
kind: BuildConfig
apiVersion: build.openshift.io/v1
metadata:
  name: web  # frontend
spec:
  strategy:
    type: Source
    sourceStrategy:
      from:
        kind: ImageStreamTag
        name: python-36:latest
"#;

    #[test]
    fn test_write_back_keeps_comments_and_key_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bc.yaml");
        std::fs::write(&path, COMMENTED).unwrap();

        let set = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        let mut web = set.resources()[0].clone();
        crate::buildconfig::set_source_image_stream_tag(&mut web, "s2i-thoth-ubi8-py36:latest")
            .unwrap();
        set.write_back(&web).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            COMMENTED.replace("python-36:latest", "s2i-thoth-ubi8-py36:latest")
        );
    }

    #[test]
    fn test_write_back_edits_only_the_matching_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bc.yaml");
        let content = format!(
            "{}---\n{}",
            COMMENTED,
            COMMENTED.replace("name: web", "name: api")
        );
        std::fs::write(&path, &content).unwrap();

        let set = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        let mut api = set.resources()[1].clone();
        crate::buildconfig::set_source_image_stream_tag(&mut api, "s2i-thoth-ubi8-py36:latest")
            .unwrap();
        set.write_back(&api).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Managed by ops"));
        assert_eq!(written.matches("python-36:latest").count(), 2);
        assert_eq!(written.matches("s2i-thoth-ubi8-py36:latest").count(), 1);

        let reloaded = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        assert_eq!(
            reloaded.resources()[0].raw()["spec"]["strategy"]["sourceStrategy"]["from"]["name"],
            "python-36:latest"
        );
        assert_eq!(
            reloaded.resources()[1].raw()["spec"]["strategy"]["sourceStrategy"]["from"]["name"],
            "s2i-thoth-ubi8-py36:latest"
        );
    }

    #[test]
    fn test_write_back_with_env_keeps_key_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bc.yaml");
        std::fs::write(&path, COMMENTED).unwrap();

        let set = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        let mut web = set.resources()[0].clone();
        crate::buildconfig::set_source_image_stream_tag(&mut web, "s2i-thoth-ubi8-py36:latest")
            .unwrap();
        crate::buildconfig::append_source_env(
            &mut web,
            &[crate::EnvVarSpec {
                name: "THOTH_ADVISE".to_string(),
                value: Some("1".to_string()),
                value_from: None,
            }],
        )
        .unwrap();
        set.write_back(&web).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let position = |needle: &str| written.find(needle).unwrap();
        assert!(position("kind: BuildConfig") < position("apiVersion:"));
        assert!(position("type: Source") < position("sourceStrategy:"));
        assert!(written.contains("THOTH_ADVISE"));
    }

    #[test]
    fn test_write_back_keeps_json_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(&path, LIST).unwrap();

        let set = TemplateSet::load(&path, ResourceKind::BuildConfig, &LoadOptions::default())
            .unwrap();
        let mut api = set.resources()[0].clone();
        api.raw_mut()["metadata"]["labels"] = json!({"thoth": "true"});
        set.write_back(&api).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["items"][0]["metadata"]["labels"]["thoth"], "true");
    }

    #[test]
    fn test_write_back_requires_origin() {
        let set = TemplateSet {
            resources: Vec::new(),
            files: Mutex::new(HashMap::new()),
        };
        let resource = RawResource::new(json!({"metadata": {"name": "detached"}}));
        assert!(set.write_back(&resource).is_err());
    }
}
