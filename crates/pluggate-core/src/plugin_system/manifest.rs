use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::{MIN_LICENSE_LEN, MIN_NAME_LEN};
use crate::plugin_system::dependency::{DependencyInterner, PluginDependency};
use crate::plugin_system::error::{ManifestError, ManifestViolation};

/// The fields a plugin declares about itself in `plugin.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginManifest {
    /// Unique identifier for the plugin
    #[serde(rename = "$id")]
    pub id: Uuid,

    /// Human-readable name, at least five characters
    pub name: String,

    /// Plugin description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// SPDX license id, at least two characters
    pub license: String,

    /// Plugin version as written in the manifest
    pub version: String,

    /// Plugin dependencies, in declaration order
    pub dependencies: Vec<Arc<PluginDependency>>,
}

// --- Field extraction from the raw JSON object ---

type JsonObject = Map<String, Value>;

/// A string field; `null` counts as absent. Wrong types are reported, not fatal.
fn string_field(
    object: &JsonObject,
    key: &str,
    field: &str,
    violations: &mut Vec<ManifestViolation>,
) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(ManifestViolation::new(
                field,
                format!("must be a string, found {}", json_type(other)),
            ));
            None
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn required_string(
    object: &JsonObject,
    key: &str,
    field: &str,
    violations: &mut Vec<ManifestViolation>,
) -> String {
    let present = matches!(object.get(key), Some(v) if !v.is_null());
    match string_field(object, key, field, violations) {
        Some(value) => value,
        None => {
            if !present {
                violations.push(ManifestViolation::missing(field));
            }
            String::new()
        }
    }
}

fn required_uuid(
    object: &JsonObject,
    key: &str,
    field: &str,
    violations: &mut Vec<ManifestViolation>,
) -> Uuid {
    let present = matches!(object.get(key), Some(v) if !v.is_null());
    match string_field(object, key, field, violations) {
        Some(text) => match Uuid::parse_str(text.trim()) {
            Ok(id) => id,
            Err(e) => {
                violations.push(ManifestViolation::new(field, format!("not a valid UUID: {}", e)));
                Uuid::nil()
            }
        },
        None => {
            if !present {
                violations.push(ManifestViolation::missing(field));
            }
            Uuid::nil()
        }
    }
}

fn dependency_list(
    object: &JsonObject,
    interner: &DependencyInterner,
    violations: &mut Vec<ManifestViolation>,
) -> Vec<Arc<PluginDependency>> {
    let entries = match object.get("dependencies") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            violations.push(ManifestViolation::new(
                "dependencies",
                format!("must be an array, found {}", json_type(other)),
            ));
            return Vec::new();
        }
    };

    let mut dependencies = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Value::Object(raw) = entry else {
            violations.push(ManifestViolation::new(
                format!("dependencies[{}]", index),
                format!("must be an object, found {}", json_type(entry)),
            ));
            continue;
        };
        let target = required_uuid(raw, "$id", &format!("dependencies[{}].$id", index), violations);
        let range = required_string(raw, "version", &format!("dependencies[{}].version", index), violations);
        dependencies.push(interner.intern(target, &range));
    }
    dependencies
}

fn manifest_from_object(object: &JsonObject, interner: &DependencyInterner) -> Result<PluginManifest, ManifestError> {
    let mut violations = Vec::new();

    let id = required_uuid(object, "$id", "$id", &mut violations);
    let name = required_string(object, "name", "name", &mut violations);
    let description = string_field(object, "description", "description", &mut violations);
    let license = required_string(object, "license", "license", &mut violations);
    let version = required_string(object, "version", "version", &mut violations);
    let dependencies = dependency_list(object, interner, &mut violations);

    let manifest = PluginManifest {
        id,
        name,
        description,
        license,
        version,
        dependencies,
    };

    // Missing or mistyped fields are already reported; don't also flag them as too short.
    for violation in manifest.violations() {
        if !violations.iter().any(|v| v.field == violation.field) {
            violations.push(violation);
        }
    }

    if violations.is_empty() {
        Ok(manifest)
    } else {
        Err(ManifestError::Invalid { violations })
    }
}

impl PluginManifest {
    /// Parse and validate the text of a `plugin.json` entry.
    ///
    /// Text that is not a JSON object is malformed. Otherwise unknown fields
    /// are ignored and every violated field is reported, including fields
    /// of the wrong JSON type.
    pub fn from_json(text: &str, interner: &DependencyInterner) -> Result<Self, ManifestError> {
        let object: JsonObject = serde_json::from_str(text)?;
        manifest_from_object(&object, interner)
    }

    /// Field constraints that do not depend on the archive.
    pub fn violations(&self) -> Vec<ManifestViolation> {
        let mut violations = Vec::new();
        if self.name.chars().count() < MIN_NAME_LEN {
            violations.push(ManifestViolation::new(
                "name",
                format!("must be at least {} characters long", MIN_NAME_LEN),
            ));
        }
        if self.license.chars().count() < MIN_LICENSE_LEN {
            violations.push(ManifestViolation::new(
                "license",
                format!("must be at least {} characters long", MIN_LICENSE_LEN),
            ));
        }
        if self.version.trim().is_empty() {
            violations.push(ManifestViolation::new("version", "must not be empty"));
        }
        violations
    }

    /// Validate the manifest fields
    pub fn validate(&self) -> Result<(), ManifestError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid { violations })
        }
    }
}

/// Builder for creating a plugin manifest in code
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder
    pub fn new(id: Uuid, name: &str, version: &str) -> Self {
        Self {
            manifest: PluginManifest {
                id,
                name: name.to_string(),
                description: None,
                license: String::new(),
                version: version.to_string(),
                dependencies: Vec::new(),
            },
        }
    }

    /// Set the plugin description
    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = Some(description.to_string());
        self
    }

    /// Set the plugin license
    pub fn license(mut self, license: &str) -> Self {
        self.manifest.license = license.to_string();
        self
    }

    /// Add a dependency
    pub fn dependency(mut self, target_id: Uuid, version_range: &str) -> Self {
        self.manifest
            .dependencies
            .push(Arc::new(PluginDependency::new(target_id, version_range)));
        self
    }

    /// Build the manifest. Validation happens when a descriptor is made from it.
    pub fn build(self) -> PluginManifest {
        self.manifest
    }
}
