//! Host adapter contract
//!
//! The surrounding application (CMS, LMS, admin service) implements this
//! capability trait; the core consumes it. The core never talks to a
//! database or decides where permanent storage lives - it asks the host.
//!
//! Commit serialization per content id is a caller obligation: the core
//! assumes at most one in-flight commit owns the scratch directory and
//! the permanent storage tree at a time.

use crate::error::Result;
use crate::metadata::ContentMetadata;
use crate::types::{LibraryDescriptor, LibraryUsage, PackageManifest};
use crate::version::Dependency;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Stable identifier the host assigns to a stored library build.
pub type LibraryId = u64;

/// The kind of dependency edge being persisted for a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Preloaded,
    Dynamic,
    Editor,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Preloaded => "preloaded",
            DependencyKind::Dynamic => "dynamic",
            DependencyKind::Editor => "editor",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the host application provides to the package core.
pub trait HostAdapter {
    /// Path to the uploaded archive file awaiting validation.
    fn uploaded_package_path(&self) -> PathBuf;

    /// Exclusive scratch directory the archive is extracted into.
    fn uploaded_folder_path(&self) -> PathBuf;

    /// Root of permanent storage (`libraries/` and `content/` live here).
    fn storage_path(&self) -> PathBuf;

    /// Look up a stored library by machine name and exact major/minor.
    fn get_library_id(&self, machine_name: &str, major: u32, minor: u32) -> Option<LibraryId>;

    /// Whether the incoming copy is a newer build (higher patch) of a
    /// version the host already stores.
    fn is_patched_library(&self, library: &LibraryDescriptor) -> bool;

    /// Persist library data. `new` selects insert versus in-place patch
    /// of the existing build; returns the library's storage id.
    fn save_library_data(&mut self, library: &LibraryDescriptor, new: bool) -> Result<LibraryId>;

    /// Persist one kind of dependency edges for a library.
    fn save_library_dependencies(
        &mut self,
        library_id: LibraryId,
        kind: DependencyKind,
        dependencies: &[Dependency],
    ) -> Result<()>;

    /// Drop every dependency edge stored for a library. Paired with
    /// [`HostAdapter::save_library_dependencies`] this makes dependency
    /// persistence idempotent under retries.
    fn delete_library_dependencies(&mut self, library_id: LibraryId) -> Result<()>;

    /// Load a stored library's descriptor by exact major/minor.
    fn load_library(&self, machine_name: &str, major: u32, minor: u32)
        -> Option<LibraryDescriptor>;

    /// Persist a content item's parameters, manifest data, and sanitized
    /// metadata.
    fn save_content_data(
        &mut self,
        content_id: &str,
        params: &Value,
        manifest: &PackageManifest,
        metadata: &ContentMetadata,
        main_library_id: LibraryId,
    ) -> Result<()>;

    /// Duplicate stored content data under a new id.
    fn copy_content_data(&mut self, source_id: &str, new_id: &str) -> Result<()>;

    /// Remove a content item's stored data.
    fn delete_content_data(&mut self, content_id: &str) -> Result<()>;

    /// Record which libraries a content item uses and how.
    fn save_library_usage(&mut self, content_id: &str, usage: &[LibraryUsage]) -> Result<()>;

    /// Remove a content item's usage records.
    fn delete_library_usage(&mut self, content_id: &str) -> Result<()>;

    /// Duplicate usage records under a new content id.
    fn copy_library_usage(&mut self, source_id: &str, new_id: &str) -> Result<()>;
}
