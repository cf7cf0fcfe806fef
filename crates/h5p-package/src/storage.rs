//! Storage commit
//!
//! Takes a validated package and makes it permanent: per-library
//! install/patch/skip decisions, dependency edge persistence, content
//! folder promotion, and usage recording. Library operations are
//! idempotent so a re-run after a partial failure converges; there is no
//! rollback of already-committed libraries.

use crate::dependency::DependencyResolver;
use crate::events::{EventDispatcher, PlatformEvent};
use crate::validator::ValidatedPackage;
use h5p_core::error::{Error, Result};
use h5p_core::fsutil;
use h5p_core::host::{HostAdapter, LibraryId};
use h5p_core::types::LibraryDescriptor;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// What the commit did per library.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Libraries stored for the first time
    pub installed: Vec<String>,
    /// Existing versions replaced by a higher patch build
    pub patched: Vec<String>,
    /// Already stored at an equal or newer build
    pub skipped: Vec<String>,
}

/// Commits validated packages into permanent storage.
pub struct StorageCommitter {
    events: EventDispatcher,
}

impl Default for StorageCommitter {
    fn default() -> Self {
        Self::new(EventDispatcher::disabled())
    }
}

impl StorageCommitter {
    pub fn new(events: EventDispatcher) -> Self {
        Self { events }
    }

    /// Commit a validated package under `content_id`.
    ///
    /// Library folders and the content folder move out of the scratch
    /// directory into `storage_path()`; the scratch directory is removed
    /// whether the commit succeeds or fails. A mid-way failure leaves
    /// already-committed libraries in place; re-running the upload skips
    /// them and finishes the rest.
    pub fn commit(
        &mut self,
        validated: &ValidatedPackage,
        content_id: &str,
        host: &mut dyn HostAdapter,
    ) -> Result<CommitOutcome> {
        let scratch = host.uploaded_folder_path();
        match self.commit_package(validated, content_id, host) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                // A fatal failure forfeits the upload; scratch must not
                // linger
                if let Err(cleanup) = fsutil::delete_tree(&scratch) {
                    warn!(scratch = %scratch.display(), error = %cleanup, "could not remove scratch after failed commit");
                }
                Err(error)
            }
        }
    }

    fn commit_package(
        &mut self,
        validated: &ValidatedPackage,
        content_id: &str,
        host: &mut dyn HostAdapter,
    ) -> Result<CommitOutcome> {
        let scratch = host.uploaded_folder_path();
        let storage = host.storage_path();
        let mut outcome = CommitOutcome::default();

        for library in validated.libraries.values() {
            self.commit_library(library, &scratch, &storage, host, &mut outcome)?;
        }

        let main_library_id = self.main_library_id(validated, host)?;

        let content_scratch = scratch.join("content");
        let content_store = storage.join("content").join(content_id);
        fsutil::delete_tree(&content_store)?;
        fsutil::move_tree(&content_scratch, &content_store)?;

        host.save_content_data(
            content_id,
            &validated.content_params,
            &validated.manifest,
            &validated.metadata,
            main_library_id,
        )?;

        let usage = DependencyResolver::resolve_usage(&validated.manifest, host)?;
        let usage: Vec<_> = usage.into_values().collect();
        host.save_library_usage(content_id, &usage)?;

        fsutil::delete_tree(&scratch)?;

        self.events.emit(PlatformEvent::ContentCreated {
            content_id: content_id.to_string(),
            title: validated.manifest.title.clone(),
        });
        info!(
            content_id,
            installed = outcome.installed.len(),
            patched = outcome.patched.len(),
            skipped = outcome.skipped.len(),
            "package committed"
        );
        Ok(outcome)
    }

    fn commit_library(
        &mut self,
        library: &LibraryDescriptor,
        scratch: &Path,
        storage: &Path,
        host: &mut dyn HostAdapter,
        outcome: &mut CommitOutcome,
    ) -> Result<()> {
        let name = library.to_string();
        let folder = scratch.join(&library.machine_name);

        let existing = host.get_library_id(
            &library.machine_name,
            library.major_version,
            library.minor_version,
        );
        let new = existing.is_none();
        if !new && !host.is_patched_library(library) {
            // Same or newer build already stored; the scratch copy is
            // surplus
            debug!(library = %name, "already stored, skipping");
            fsutil::delete_tree(&folder)?;
            outcome.skipped.push(name);
            return Ok(());
        }

        let library_id = host.save_library_data(library, new)?;

        let destination = storage.join("libraries").join(library_id.to_string());
        fsutil::delete_tree(&destination)?;
        fsutil::move_tree(&folder, &destination)
            .map_err(|e| Error::commit(name.clone(), e.to_string()))?;

        // Replace edges wholesale so retries cannot double-insert
        host.delete_library_dependencies(library_id)?;
        for (kind, dependencies) in library.dependency_lists() {
            if !dependencies.is_empty() {
                host.save_library_dependencies(library_id, kind, dependencies)?;
            }
        }

        if new {
            self.events.emit(PlatformEvent::LibraryInstalled {
                library: name.clone(),
            });
            outcome.installed.push(name);
        } else {
            self.events.emit(PlatformEvent::LibraryPatched {
                library: name.clone(),
            });
            outcome.patched.push(name);
        }
        Ok(())
    }

    /// Storage id of the package's main library. It is either one of the
    /// package's own libraries (just committed) or already installed and
    /// named by a preloaded dependency.
    fn main_library_id(
        &self,
        validated: &ValidatedPackage,
        host: &dyn HostAdapter,
    ) -> Result<LibraryId> {
        let main = &validated.manifest.main_library;
        let dependency = validated
            .libraries
            .get(main)
            .map(|library| library.as_dependency())
            .or_else(|| {
                validated
                    .manifest
                    .preloaded_dependencies
                    .iter()
                    .find(|d| d.machine_name == *main)
                    .cloned()
            })
            .ok_or_else(|| {
                Error::commit(main.clone(), "main library is not declared by the package")
            })?;

        host.get_library_id(
            &dependency.machine_name,
            dependency.major_version,
            dependency.minor_version,
        )
        .ok_or_else(|| Error::library_not_installed(dependency))
    }

    /// Remove a content item: stored folder, content data, usage records.
    pub fn delete_content(&mut self, content_id: &str, host: &mut dyn HostAdapter) -> Result<()> {
        let folder = host.storage_path().join("content").join(content_id);
        fsutil::delete_tree(&folder)?;
        host.delete_library_usage(content_id)?;
        host.delete_content_data(content_id)?;
        self.events.emit(PlatformEvent::ContentDeleted {
            content_id: content_id.to_string(),
        });
        Ok(())
    }

    /// Duplicate a content item under a new id. Libraries are shared;
    /// only the content folder, data, and usage records are copied.
    pub fn copy_content(
        &mut self,
        source_id: &str,
        new_id: &str,
        host: &mut dyn HostAdapter,
    ) -> Result<()> {
        let content_root = host.storage_path().join("content");
        fsutil::copy_tree(&content_root.join(source_id), &content_root.join(new_id))?;
        host.copy_content_data(source_id, new_id)?;
        host.copy_library_usage(source_id, new_id)?;
        debug!(source_id, new_id, "content copied");
        Ok(())
    }

    /// Persist the parameters an upgrade job produced: rewrite the
    /// stored `content.json` and record the upgrade.
    pub fn apply_upgrade(
        &mut self,
        content_id: &str,
        library: &str,
        params: &Value,
        host: &mut dyn HostAdapter,
    ) -> Result<()> {
        let path = host
            .storage_path()
            .join("content")
            .join(content_id)
            .join("content.json");
        fs::write(&path, serde_json::to_vec(params)?)
            .map_err(|e| Error::commit(content_id.to_string(), e.to_string()))?;
        self.events.emit(PlatformEvent::ContentUpgraded {
            content_id: content_id.to_string(),
            library: library.to_string(),
        });
        info!(content_id, library, "upgraded parameters stored");
        Ok(())
    }

    /// Replace a content item with a freshly validated package.
    pub fn update_content(
        &mut self,
        validated: &ValidatedPackage,
        content_id: &str,
        host: &mut dyn HostAdapter,
    ) -> Result<CommitOutcome> {
        self.delete_content(content_id, host)?;
        let outcome = self.commit(validated, content_id, host)?;
        self.events.emit(PlatformEvent::ContentUpdated {
            content_id: content_id.to_string(),
            title: validated.manifest.title.clone(),
        });
        Ok(outcome)
    }
}
