//! Resource validation utilities.

use crate::schema;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// Build config schema, compiled once on first use.
static BUILD_CONFIG_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    let schema_value = schema::build_config_schema();
    JSONSchema::compile(&schema_value).map_err(|e| e.to_string())
});

/// Validation error type.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Unexpected kind {0:?}, expected BuildConfig")]
    UnexpectedKind(String),
}

/// Result of resource validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    /// All errors joined into one line.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a raw build config against the JSON schema.
pub fn validate_build_config(resource: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = ValidationResult::new();

    let compiled = BUILD_CONFIG_VALIDATOR
        .as_ref()
        .map_err(|e| ValidationError::SchemaError(e.clone()))?;

    let validation = compiled.validate(resource);
    if let Err(errors) = validation {
        for error in errors {
            result.add_error(ValidationError::SchemaError(format!(
                "{} at {}",
                error, error.instance_path
            )));
        }
    }

    if let Some(kind) = resource.get("kind").and_then(Value::as_str) {
        if !kind.trim().eq_ignore_ascii_case("buildconfig") {
            result.add_error(ValidationError::UnexpectedKind(kind.to_string()));
        }
    }

    Ok(result)
}
