//! Whole-package validation
//!
//! Drives extraction, scans the scratch tree, validates every manifest
//! against the field tables, and cross-checks dependencies. Issues are
//! accumulated across the whole package; only after the full scan does a
//! non-empty issue list fail the upload, and failure always removes the
//! scratch directory so a rejected upload leaves no trace.

use crate::dependency::DependencyResolver;
use crate::extract::ArchiveExtractor;
use h5p_core::error::{Error, Result};
use h5p_core::fsutil;
use h5p_core::host::HostAdapter;
use h5p_core::metadata::ContentMetadata;
use h5p_core::schema::{self, ValidationIssue};
use h5p_core::types::{LibraryDescriptor, PackageManifest, ResolvedLibrarySet};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// The outcome of a successful validation, ready to commit.
#[derive(Debug)]
pub struct ValidatedPackage {
    pub manifest: PackageManifest,
    /// Sanitized metadata fields carried by `h5p.json`
    pub metadata: ContentMetadata,
    pub libraries: ResolvedLibrarySet,
    /// Parsed `content/content.json`
    pub content_params: Value,
}

/// Validates one uploaded package end to end.
pub struct PackageValidator;

impl PackageValidator {
    /// Extract and validate the host's uploaded package.
    ///
    /// On success the scratch directory is left in place for
    /// [`crate::storage::StorageCommitter`]. On failure the scratch
    /// directory is deleted and every collected issue is returned inside
    /// [`Error::InvalidPackage`].
    pub fn validate_package(host: &dyn HostAdapter) -> Result<ValidatedPackage> {
        let archive = host.uploaded_package_path();
        let scratch = host.uploaded_folder_path();

        if let Err(error) = ArchiveExtractor::extract(&archive, &scratch) {
            // A mid-extraction failure leaves a partial tree behind
            fsutil::delete_tree(&scratch)?;
            return Err(error);
        }
        // The archive itself is spent once extracted
        if let Err(e) = fs::remove_file(&archive) {
            warn!(archive = %archive.display(), error = %e, "could not remove uploaded archive");
        }

        match Self::scan(&scratch, host) {
            Ok(validated) => Ok(validated),
            Err(error) => {
                fsutil::delete_tree(&scratch)?;
                Err(error)
            }
        }
    }

    fn scan(scratch: &Path, host: &dyn HostAdapter) -> Result<ValidatedPackage> {
        let mut issues = Vec::new();
        let mut manifest: Option<(PackageManifest, ContentMetadata)> = None;
        let mut content_params: Option<Value> = None;
        let mut content_folder_seen = false;
        let mut libraries = ResolvedLibrarySet::new();

        for entry in fs::read_dir(scratch)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if path.is_file() {
                // Root file names are matched case-insensitively; some
                // authoring tools upper-case them
                match name.to_ascii_lowercase().as_str() {
                    "h5p.json" => {
                        manifest = Self::read_manifest(&path, &mut issues);
                    }
                    // Optional poster image, nothing to validate
                    "h5p.jpg" => {}
                    _ => {
                        debug!(file = %name, "ignoring unexpected file at package root");
                    }
                }
                continue;
            }

            if name == "content" {
                content_folder_seen = true;
                content_params = Self::read_content(&path, &mut issues);
                continue;
            }
            // Hidden folders and names with dots (e.g. __MACOSX artifacts
            // renamed by some zip tools) are skipped silently
            if name.contains('.') {
                continue;
            }
            if !schema::is_valid_machine_name(&name) {
                issues.push(ValidationIssue::InvalidFolderName { name });
                continue;
            }

            if let Some(library) = Self::read_library(&path, &name, &mut issues) {
                if libraries.contains_key(&library.machine_name) {
                    issues.push(ValidationIssue::DuplicateLibrary {
                        machine_name: library.machine_name.clone(),
                    });
                } else {
                    libraries.insert(library.machine_name.clone(), library);
                }
            }
        }

        if !content_folder_seen {
            issues.push(ValidationIssue::MissingContentFolder);
        }
        if manifest.is_none() {
            issues.push(ValidationIssue::MissingMainManifest);
        }

        issues.extend(DependencyResolver::check_preloaded_acyclic(&libraries));

        if let Some((manifest, _)) = &manifest {
            let mut missing = DependencyResolver::find_missing(&libraries, manifest);
            DependencyResolver::prune_installed(&mut missing, host);
            for (_, dependency) in missing {
                issues.push(ValidationIssue::missing_dependency(dependency));
            }
        }

        if !issues.is_empty() {
            warn!(issues = issues.len(), "package rejected");
            return Err(Error::invalid_package(issues));
        }

        // Guarded by the issue checks above
        let (Some((manifest, metadata)), Some(content_params)) = (manifest, content_params)
        else {
            return Err(Error::invalid_package(issues));
        };
        info!(
            title = %manifest.title,
            libraries = libraries.len(),
            "package validated"
        );
        Ok(ValidatedPackage {
            manifest,
            metadata,
            libraries,
            content_params,
        })
    }

    /// Parse and validate `h5p.json`. Collects issues; returns the parsed
    /// manifest and its sanitized metadata fields only when the field
    /// tables pass.
    fn read_manifest(
        path: &Path,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<(PackageManifest, ContentMetadata)> {
        let data = Self::read_json(path, "the package root", issues)?;
        let mut found = schema::validate_required(&data, schema::PACKAGE_REQUIRED, "h5p.json");
        found.extend(schema::validate_optional(
            &data,
            schema::PACKAGE_OPTIONAL,
            "h5p.json",
        ));
        if !found.is_empty() {
            issues.extend(found);
            return None;
        }
        // Metadata fields ride along in the manifest; a shape mismatch
        // there loses the metadata, not the package
        let metadata = serde_json::from_value::<ContentMetadata>(data.clone())
            .unwrap_or_default()
            .sanitize();
        match serde_json::from_value(data) {
            Ok(manifest) => Some((manifest, metadata)),
            Err(e) => {
                debug!(error = %e, "h5p.json passed field tables but not deserialization");
                issues.push(ValidationIssue::invalid_manifest("h5p.json", "the package root"));
                None
            }
        }
    }

    /// The content folder must hold a parseable `content.json`.
    fn read_content(dir: &Path, issues: &mut Vec<ValidationIssue>) -> Option<Value> {
        let path = dir.join("content.json");
        if !path.is_file() {
            issues.push(ValidationIssue::MissingContentFolder);
            return None;
        }
        Self::read_json(&path, "the content folder", issues)
    }

    /// Validate one library folder: `library.json` against the field
    /// tables, declared js/css assets present on disk, optional
    /// `semantics.json` attached when parseable.
    fn read_library(
        dir: &Path,
        folder: &str,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<LibraryDescriptor> {
        let manifest_path = dir.join("library.json");
        let data = match Self::read_json(&manifest_path, folder, issues) {
            Some(data) => data,
            None => return None,
        };

        let mut found = schema::validate_required(&data, schema::LIBRARY_REQUIRED, "library.json");
        found.extend(schema::validate_optional(
            &data,
            schema::LIBRARY_OPTIONAL,
            "library.json",
        ));
        let failed = !found.is_empty();
        issues.extend(found);
        if failed {
            return None;
        }

        let mut library: LibraryDescriptor = match serde_json::from_value(data) {
            Ok(library) => library,
            Err(e) => {
                debug!(folder, error = %e, "library.json passed field tables but not deserialization");
                issues.push(ValidationIssue::invalid_manifest("library.json", folder));
                return None;
            }
        };

        for file in library.preloaded_js.iter().chain(&library.preloaded_css) {
            if !Self::asset_exists(dir, &file.path) {
                issues.push(ValidationIssue::missing_library_file(
                    file.path.clone(),
                    folder,
                ));
            }
        }

        let semantics_path = dir.join("semantics.json");
        if semantics_path.is_file() {
            library.semantics = Self::read_json(&semantics_path, folder, issues);
        }

        Some(library)
    }

    /// Declared asset paths may use either separator.
    fn asset_exists(dir: &Path, declared: &str) -> bool {
        let normalized = declared.replace('\\', "/");
        let relative = normalized.trim_start_matches('/');
        dir.join(relative).is_file()
    }

    fn read_json(path: &Path, source: &str, issues: &mut Vec<ValidationIssue>) -> Option<Value> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                issues.push(ValidationIssue::invalid_manifest(file, source));
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unparseable JSON");
                issues.push(ValidationIssue::invalid_manifest(file, source));
                None
            }
        }
    }
}
