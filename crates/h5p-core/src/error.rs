//! Error types for h5p-core

use crate::schema::ValidationIssue;
use crate::version::Dependency;
use thiserror::Error;

/// Result type alias using h5p-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the package pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Uploaded archive could not be read or unpacked
    #[error("Package extraction failed: {message}")]
    Extraction { message: String },

    /// Package failed validation; carries every collected issue
    #[error("Invalid package:\n{}", format_issues(.issues))]
    InvalidPackage { issues: Vec<ValidationIssue> },

    /// A failure while moving or persisting a library or content folder
    #[error("Commit failed for {subject}: {message}")]
    Commit { subject: String, message: String },

    /// A dependency lookup against host storage came back empty
    #[error("Library is not installed: {dependency}")]
    LibraryNotInstalled { dependency: Dependency },

    /// Host adapter persistence failure
    #[error("Host storage error: {message}")]
    Host { message: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    /// Create an invalid-package error from collected issues
    pub fn invalid_package(issues: Vec<ValidationIssue>) -> Self {
        Self::InvalidPackage { issues }
    }

    /// Create a commit error naming the failed subject
    pub fn commit(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Commit {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a host storage error
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Create a library-not-installed error
    pub fn library_not_installed(dependency: Dependency) -> Self {
        Self::LibraryNotInstalled { dependency }
    }

    /// The validation issues carried by an invalid-package error, if any
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::InvalidPackage { issues } => Some(issues),
            _ => None,
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
