//! # h5p-package
//!
//! The package pipeline: archive extraction, whole-package validation,
//! dependency resolution, and the commit into permanent storage, plus
//! the platform event vocabulary those operations emit.
//!
//! The usual flow is
//! [`PackageValidator::validate_package`] followed by
//! [`StorageCommitter::commit`]; everything storage-shaped goes through
//! the host's [`h5p_core::HostAdapter`].

pub mod dependency;
pub mod events;
pub mod extract;
pub mod storage;
pub mod validator;

pub use dependency::DependencyResolver;
pub use events::{EventDispatcher, EventEnvelope, EventSink, LogLevel, PlatformEvent};
pub use extract::ArchiveExtractor;
pub use storage::{CommitOutcome, StorageCommitter};
pub use validator::{PackageValidator, ValidatedPackage};
