//! Human readable rendering of descriptors and migration results.

use crate::descriptor::BuildConfigDescriptor;
use crate::orchestrator::MigrationResult;
use std::fmt::Write;
use thoth_s2i_common::{ImageReference, DEFAULT_TAG};

const ENTRY: &str = "📝";
const ARROW: &str = "🠒";
const NONE: &str = "-";

fn or_none(value: Option<String>) -> String {
    value.unwrap_or_else(|| NONE.to_string())
}

fn joined<T: ToString>(values: &[T]) -> String {
    if values.is_empty() {
        return NONE.to_string();
    }
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render one descriptor as a block of `key: value` lines.
pub fn render_descriptor(descriptor: &BuildConfigDescriptor) -> String {
    let fields = [
        ("namespace", or_none(descriptor.namespace.clone())),
        ("strategy", descriptor.strategy.to_string()),
        (
            "source_kind",
            or_none(descriptor.source_kind.as_ref().map(ToString::to_string)),
        ),
        ("image_stream_name", or_none(descriptor.image_stream_name.clone())),
        ("image_stream_tag", or_none(descriptor.image_stream_tag.clone())),
        (
            "resolved_image",
            or_none(descriptor.resolved_image.as_ref().map(ToString::to_string)),
        ),
        ("is_s2i", descriptor.is_s2i.to_string()),
        ("is_s2i_thoth", descriptor.is_s2i_thoth.to_string()),
        ("env", joined(&descriptor.env)),
        ("triggers", joined(&descriptor.triggers)),
    ];

    let mut out = format!("{} {}\n", ENTRY, descriptor.name);
    for (key, value) in fields {
        let _ = writeln!(out, "\t\t{} {}: {}", ARROW, key, value);
    }
    out
}

/// Render descriptors in input order.
pub fn render(descriptors: &[BuildConfigDescriptor]) -> String {
    descriptors.iter().map(render_descriptor).collect()
}

/// One line per item followed by totals.
pub fn render_summary(result: &MigrationResult) -> String {
    let mut out = String::new();
    let verb = if result.dry_run { "would patch" } else { "patched" };

    for item in &result.applied {
        let target = item
            .plan
            .target_image_stream_tag_ref
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| NONE.to_string());
        let _ = writeln!(
            out,
            "✔ {} {} -> {} (env vars: {}, build: {}, import: {})",
            verb,
            item.descriptor.name,
            target,
            item.plan.env_var_insertions.len(),
            if item.plan.triggers_build { "yes" } else { "no" },
            if item.plan.requires_image_import { "yes" } else { "no" },
        );
    }
    for item in &result.skipped {
        let _ = writeln!(out, "- skipped {}: {}", item.name, item.reason);
    }
    for item in &result.errors {
        let _ = writeln!(out, "✖ failed {}: {}", item.name, item.error);
    }

    let _ = writeln!(
        out,
        "{}: {}, skipped: {}, failed: {}{}",
        if result.dry_run { "Planned" } else { "Applied" },
        result.applied.len(),
        result.skipped.len(),
        result.errors.len(),
        if result.dry_run { " (dry run)" } else { "" },
    );
    out
}

/// Reminder to create the target image stream once templates were patched.
///
/// Template files cannot import images, so patched build configs reference
/// an image stream that may not exist yet.
pub fn image_stream_reminder(result: &MigrationResult, target: &ImageReference) -> Option<String> {
    if result.applied.is_empty() {
        return None;
    }
    Some(format!(
        "Don't forget to create an image stream with image {} and tag {}",
        target.name(),
        target.tag().unwrap_or(DEFAULT_TAG)
    ))
}
