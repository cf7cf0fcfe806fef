//! # h5p-core
//!
//! Core library for the H5P package platform providing:
//! - Manifest and library type definitions
//! - Required/optional field-schema validation tables
//! - Content metadata handling with bounded fields
//! - The host adapter contract implemented by the surrounding application
//! - Recursive filesystem helpers for scratch and permanent storage

pub mod error;
pub mod fsutil;
pub mod host;
pub mod metadata;
pub mod schema;
pub mod types;
pub mod version;

pub use error::{Error, Result};
pub use host::{DependencyKind, HostAdapter, LibraryId};
pub use metadata::ContentMetadata;
pub use schema::ValidationIssue;
pub use types::{
    EmbedType, FileRef, LibraryDescriptor, LibraryUsage, PackageManifest, ResolvedLibrarySet,
};
pub use version::{Dependency, LibraryVersion, VersionKey};
