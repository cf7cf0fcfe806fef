//! Manifest and library data model
//!
//! These structs mirror the package wire format: `h5p.json` for the main
//! package manifest and `library.json` for each library. Both are
//! `camelCase` JSON documents. Unknown fields are tolerated on the way
//! in (forward compatibility) and dropped on re-serialization.

use crate::version::{Dependency, LibraryVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Where embedded content may be hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedType {
    Iframe,
    Div,
}

impl fmt::Display for EmbedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedType::Iframe => write!(f, "iframe"),
            EmbedType::Div => write!(f, "div"),
        }
    }
}

/// A js/css asset declaration inside a library manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
}

/// A parsed `library.json`.
///
/// Identity key is `(machine_name, major_version, minor_version)`;
/// `patch_version` distinguishes builds of the same release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDescriptor {
    pub machine_name: String,
    pub title: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runnable: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editor_dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_js: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_css: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop_library_css: Vec<DropCss>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_types: Option<Vec<EmbedType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    /// Opaque editor semantics, attached from `semantics.json` when the
    /// library folder carries one. Only checked for well-formedness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantics: Option<Value>,
}

/// A library whose stylesheet should be dropped when this one loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropCss {
    pub machine_name: String,
}

impl LibraryDescriptor {
    pub fn version(&self) -> LibraryVersion {
        LibraryVersion::new(self.major_version, self.minor_version, self.patch_version)
    }

    /// The constraint this library satisfies.
    pub fn as_dependency(&self) -> Dependency {
        Dependency::new(
            self.machine_name.clone(),
            self.major_version,
            self.minor_version,
        )
    }

    /// Exact major/minor match against a declared constraint.
    pub fn satisfies(&self, dependency: &Dependency) -> bool {
        self.machine_name == dependency.machine_name
            && dependency.same_version(self.major_version, self.minor_version)
    }

    /// The three dependency lists with their edge kinds.
    pub fn dependency_lists(&self) -> [(crate::host::DependencyKind, &[Dependency]); 3] {
        use crate::host::DependencyKind;
        [
            (DependencyKind::Preloaded, &self.preloaded_dependencies),
            (DependencyKind::Dynamic, &self.dynamic_dependencies),
            (DependencyKind::Editor, &self.editor_dependencies),
        ]
    }
}

impl fmt::Display for LibraryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.machine_name, self.version())
    }
}

/// A parsed `h5p.json`, the top-level package manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub title: String,
    pub language: String,
    /// Machine name of the runnable entry-point library
    pub main_library: String,
    pub embed_types: Vec<EmbedType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
}

/// The libraries discovered inside one package, keyed by machine name.
///
/// One version per machine name per package: two majorVersions of the
/// same library cannot coexist in a single upload.
pub type ResolvedLibrarySet = BTreeMap<String, LibraryDescriptor>;

/// How a dependency ended up being used by a piece of content.
///
/// `preloaded` is decided by the first visit during the transitive walk:
/// a dependency first reached through a preloaded edge stays preloaded
/// even if later reached again dynamically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryUsage {
    pub library: Dependency,
    pub preloaded: bool,
}
