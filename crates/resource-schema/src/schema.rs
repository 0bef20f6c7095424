//! JSON schema definitions for resource validation.

/// JSON Schema for the `BuildConfig` fields thoth-s2i cannot work without.
pub const BUILD_CONFIG_SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "$id": "https://thoth-station.ninja/schemas/s2i/buildconfig.json",
  "title": "thoth-s2i BuildConfig",
  "type": "object",
  "required": ["metadata", "spec"],
  "properties": {
    "kind": { "type": "string" },
    "metadata": {
      "type": "object",
      "required": ["name"],
      "properties": {
        "name": { "type": "string", "minLength": 1 },
        "namespace": { "type": ["string", "null"] }
      }
    },
    "spec": {
      "type": "object",
      "required": ["strategy"],
      "properties": {
        "strategy": {
          "type": "object",
          "required": ["type"],
          "properties": {
            "type": { "type": "string", "minLength": 1 }
          }
        },
        "triggers": { "type": ["array", "null"] }
      }
    }
  }
}"#;

/// Get the build config schema as a parsed JSON value.
pub fn build_config_schema() -> serde_json::Value {
    serde_json::from_str(BUILD_CONFIG_SCHEMA).expect("Invalid build config schema")
}
