//! Manifest field-schema validation
//!
//! The package manifest (`h5p.json`) and library manifests
//! (`library.json`) are validated against fixed required/optional field
//! tables. A table entry is either a regex applied to the field's string
//! form, a boolean type marker, a set of allowed literal values, or a
//! nested schema applied to an object, a list of objects, or a list of
//! lists (plural dependency declarations).
//!
//! Validation is exhaustive: every field is checked and every problem is
//! collected before returning, so an uploader can fix all issues in one
//! pass. Fields unknown to the optional table are silently ignored;
//! packages may carry fields a given validator version does not know
//! about.

use crate::version::Dependency;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};
use tracing::debug;

/// Machine-name pattern, shared with top-level folder-name checks.
pub const MACHINE_NAME_PATTERN: &str = r"(?i)^[a-z0-9\-]{1,255}$";

const VERSION_PATTERN: &str = r"^[0-9]{1,5}$";
const TITLE_PATTERN: &str = r"^.{1,255}$";
const LANGUAGE_PATTERN: &str = r"^[a-z]{1,5}$";
const TEXT_PATTERN: &str = r"^.{1,}$";
const LICENSE_PATTERN: &str =
    r"^(cc-by|cc-by-sa|cc-by-nd|cc-by-nc|cc-by-nc-sa|cc-by-nc-nd|pd|cr)$";
const DIMENSION_PATTERN: &str = r"^[0-9]{1,4}$";
const JS_PATH_PATTERN: &str = r"(?i)^((\\|/)?[a-z_\-\s0-9]+)+\.js$";
const CSS_PATH_PATTERN: &str = r"(?i)^((\\|/)?[a-z_\-\s0-9]+)+\.css$";

/// A single validation rule for a manifest field.
#[derive(Debug, Clone, Copy)]
pub enum FieldRule {
    /// Regex matched against the field's string form
    Pattern(&'static str),
    /// Field must be a boolean (0/1 integers are accepted)
    Boolean,
    /// Flat list whose elements must come from this set
    Options(&'static [&'static str]),
    /// Nested object/list schema, applied per element for lists
    Nested(FieldSchema),
}

/// A field schema: declared fields with their rules.
pub type FieldSchema = &'static [(&'static str, FieldRule)];

/// Shape of one dependency constraint entry.
pub static DEPENDENCY_SCHEMA: FieldSchema = &[
    ("machineName", FieldRule::Pattern(MACHINE_NAME_PATTERN)),
    ("majorVersion", FieldRule::Pattern(VERSION_PATTERN)),
    ("minorVersion", FieldRule::Pattern(VERSION_PATTERN)),
];

static FILE_JS_SCHEMA: FieldSchema = &[("path", FieldRule::Pattern(JS_PATH_PATTERN))];
static FILE_CSS_SCHEMA: FieldSchema = &[("path", FieldRule::Pattern(CSS_PATH_PATTERN))];
static DROP_CSS_SCHEMA: FieldSchema =
    &[("machineName", FieldRule::Pattern(MACHINE_NAME_PATTERN))];

/// Required fields of the main package manifest.
pub static PACKAGE_REQUIRED: FieldSchema = &[
    ("title", FieldRule::Pattern(TITLE_PATTERN)),
    ("language", FieldRule::Pattern(LANGUAGE_PATTERN)),
    ("mainLibrary", FieldRule::Pattern(MACHINE_NAME_PATTERN)),
    ("preloadedDependencies", FieldRule::Nested(DEPENDENCY_SCHEMA)),
    ("embedTypes", FieldRule::Options(&["iframe", "div"])),
];

/// Optional fields of the main package manifest.
pub static PACKAGE_OPTIONAL: FieldSchema = &[
    ("contentType", FieldRule::Pattern(TITLE_PATTERN)),
    ("description", FieldRule::Pattern(TEXT_PATTERN)),
    ("author", FieldRule::Pattern(TITLE_PATTERN)),
    ("license", FieldRule::Pattern(LICENSE_PATTERN)),
    ("dynamicDependencies", FieldRule::Nested(DEPENDENCY_SCHEMA)),
    ("w", FieldRule::Pattern(DIMENSION_PATTERN)),
    ("h", FieldRule::Pattern(DIMENSION_PATTERN)),
    ("metaKeywords", FieldRule::Pattern(TEXT_PATTERN)),
    ("metaDescription", FieldRule::Pattern(TEXT_PATTERN)),
];

/// Required fields of a library manifest.
pub static LIBRARY_REQUIRED: FieldSchema = &[
    ("title", FieldRule::Pattern(TITLE_PATTERN)),
    ("majorVersion", FieldRule::Pattern(VERSION_PATTERN)),
    ("minorVersion", FieldRule::Pattern(VERSION_PATTERN)),
    ("patchVersion", FieldRule::Pattern(VERSION_PATTERN)),
    ("machineName", FieldRule::Pattern(MACHINE_NAME_PATTERN)),
];

/// Optional fields of a library manifest.
pub static LIBRARY_OPTIONAL: FieldSchema = &[
    ("author", FieldRule::Pattern(TITLE_PATTERN)),
    ("license", FieldRule::Pattern(LICENSE_PATTERN)),
    ("description", FieldRule::Pattern(TEXT_PATTERN)),
    ("runnable", FieldRule::Boolean),
    ("preloadedDependencies", FieldRule::Nested(DEPENDENCY_SCHEMA)),
    ("dynamicDependencies", FieldRule::Nested(DEPENDENCY_SCHEMA)),
    ("editorDependencies", FieldRule::Nested(DEPENDENCY_SCHEMA)),
    ("preloadedJs", FieldRule::Nested(FILE_JS_SCHEMA)),
    ("preloadedCss", FieldRule::Nested(FILE_CSS_SCHEMA)),
    ("dropLibraryCss", FieldRule::Nested(DROP_CSS_SCHEMA)),
    ("w", FieldRule::Pattern(DIMENSION_PATTERN)),
    ("h", FieldRule::Pattern(DIMENSION_PATTERN)),
    ("embedTypes", FieldRule::Options(&["iframe", "div"])),
];

/// A single problem found while validating a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A required manifest field is absent
    MissingProperty { property: String, source: String },
    /// A field is present but fails its pattern or type rule
    InvalidData { property: String, source: String },
    /// A flat-list field contains a value outside its allowed set
    IllegalOption { option: String, source: String },
    /// A manifest file is absent or is not parseable JSON
    InvalidManifest { file: String, source: String },
    /// A top-level directory name does not match the machine-name pattern
    InvalidFolderName { name: String },
    /// A declared js/css asset does not exist in the library folder
    MissingLibraryFile { file: String, library: String },
    /// The package has no content/ directory with a content.json
    MissingContentFolder,
    /// The package has no parseable main manifest
    MissingMainManifest,
    /// A declared dependency is in neither the package nor host storage
    MissingDependency { dependency: Dependency },
    /// Two package folders resolve to the same machine name
    DuplicateLibrary { machine_name: String },
    /// Preloaded dependency edges form a cycle inside the package
    PreloadedCycle { cycle: String },
}

impl ValidationIssue {
    pub fn missing_property(property: impl Into<String>, source: impl Into<String>) -> Self {
        Self::MissingProperty {
            property: property.into(),
            source: source.into(),
        }
    }

    pub fn invalid_data(property: impl Into<String>, source: impl Into<String>) -> Self {
        Self::InvalidData {
            property: property.into(),
            source: source.into(),
        }
    }

    pub fn illegal_option(option: impl Into<String>, source: impl Into<String>) -> Self {
        Self::IllegalOption {
            option: option.into(),
            source: source.into(),
        }
    }

    pub fn invalid_manifest(file: impl Into<String>, source: impl Into<String>) -> Self {
        Self::InvalidManifest {
            file: file.into(),
            source: source.into(),
        }
    }

    pub fn missing_library_file(file: impl Into<String>, library: impl Into<String>) -> Self {
        Self::MissingLibraryFile {
            file: file.into(),
            library: library.into(),
        }
    }

    pub fn missing_dependency(dependency: Dependency) -> Self {
        Self::MissingDependency { dependency }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingProperty { property, source } => {
                write!(
                    f,
                    "The required property {property} is missing from {source}"
                )
            }
            Self::InvalidData { property, source } => {
                write!(f, "Invalid data provided for {property} in {source}")
            }
            Self::IllegalOption { option, source } => {
                write!(f, "Illegal option {option} in {source}")
            }
            Self::InvalidManifest { file, source } => {
                write!(f, "Could not find or parse {file} in {source}")
            }
            Self::InvalidFolderName { name } => write!(f, "Invalid library name: {name}"),
            Self::MissingLibraryFile { file, library } => {
                write!(f, "The file {file} is missing from library: {library}")
            }
            Self::MissingContentFolder => write!(f, "A valid content folder is missing"),
            Self::MissingMainManifest => write!(f, "A valid main h5p.json file is missing"),
            Self::MissingDependency { dependency } => {
                write!(f, "Missing required library {dependency}")
            }
            Self::DuplicateLibrary { machine_name } => {
                write!(f, "Multiple versions of library {machine_name} in one package")
            }
            Self::PreloadedCycle { cycle } => {
                write!(f, "Circular preloaded dependency: {cycle}")
            }
        }
    }
}

/// Validate a manifest against its required-field table.
///
/// Every declared field is checked; a missing field contributes one
/// issue, a present-but-failing field contributes one issue. Never
/// short-circuits.
pub fn validate_required(data: &Value, schema: FieldSchema, source: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    required_into(data, schema, source, &mut issues);
    debug!(
        source,
        issues = issues.len(),
        "required-field validation finished"
    );
    issues
}

/// Validate the optional part of a manifest.
///
/// Only fields that are present are checked; fields absent from the
/// table are ignored.
pub fn validate_optional(data: &Value, schema: FieldSchema, source: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(object) = data.as_object() else {
        return issues;
    };
    for (key, value) in object {
        if let Some((_, rule)) = schema.iter().find(|(name, _)| name == key) {
            check_rule(value, rule, source, key, &mut issues);
        }
        // Unknown fields are ignored: packages may carry fields this
        // validator version does not know about.
    }
    issues
}

fn required_into(data: &Value, schema: FieldSchema, source: &str, issues: &mut Vec<ValidationIssue>) {
    for (property, rule) in schema {
        match data.get(property) {
            Some(value) => check_rule(value, rule, source, property, issues),
            None => issues.push(ValidationIssue::missing_property(*property, source)),
        }
    }
}

fn check_rule(
    value: &Value,
    rule: &FieldRule,
    source: &str,
    property: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match rule {
        FieldRule::Pattern(pattern) => {
            let text = match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
                _ => None,
            };
            match text {
                Some(text) if compiled(pattern).is_match(&text) => {}
                _ => issues.push(ValidationIssue::invalid_data(property, source)),
            }
        }
        FieldRule::Boolean => {
            let ok = match value {
                Value::Bool(_) => true,
                Value::Number(n) => matches!(n.as_u64(), Some(0) | Some(1)),
                _ => false,
            };
            if !ok {
                issues.push(ValidationIssue::invalid_data(property, source));
            }
        }
        FieldRule::Options(allowed) => match value.as_array() {
            Some(selected) => {
                for entry in selected {
                    let ok = entry
                        .as_str()
                        .map(|s| allowed.contains(&s))
                        .unwrap_or(false);
                    if !ok {
                        issues.push(ValidationIssue::illegal_option(scalar_text(entry), source));
                    }
                }
            }
            None => issues.push(ValidationIssue::invalid_data(property, source)),
        },
        FieldRule::Nested(nested) => match value {
            // A single object gets the nested schema directly
            Value::Object(_) => required_into(value, nested, source, issues),
            Value::Array(elements) => {
                for element in elements {
                    match element {
                        Value::Object(_) => required_into(element, nested, source, issues),
                        // List-of-lists: walk element-by-element against
                        // the same nested schema
                        Value::Array(inner) => {
                            for item in inner {
                                required_into(item, nested, source, issues);
                            }
                        }
                        _ => issues.push(ValidationIssue::invalid_data(property, source)),
                    }
                }
            }
            _ => issues.push(ValidationIssue::invalid_data(property, source)),
        },
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compile-once cache for the static field patterns.
fn compiled(pattern: &'static str) -> Regex {
    static CACHE: OnceLock<Mutex<HashMap<&'static str, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock().expect("pattern cache poisoned");
    cache
        .entry(pattern)
        .or_insert_with(|| Regex::new(pattern).expect("invalid static field pattern"))
        .clone()
}

/// Check a top-level folder name against the machine-name pattern.
pub fn is_valid_machine_name(name: &str) -> bool {
    compiled(MACHINE_NAME_PATTERN).is_match(name)
}
