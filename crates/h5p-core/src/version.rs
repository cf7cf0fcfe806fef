//! Library versions and dependency constraints
//!
//! A library is identified by `(machineName, majorVersion, minorVersion)`.
//! The patch version distinguishes builds of the same release: a patched
//! copy replaces the stored build in place instead of coexisting with it,
//! which is why every version comparison in this crate deliberately
//! ignores the patch component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Full three-component version of a library build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LibraryVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The identity portion of the version: major and minor only.
    pub fn key(&self) -> VersionKey {
        (self.major, self.minor)
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Major/minor pair used for exact-match dependency lookups and for
/// ordering upgrade transitions.
pub type VersionKey = (u32, u32);

/// An exact-match dependency constraint as declared in a manifest.
///
/// Constraints are not ranges: a dependency is satisfied only by a
/// library with the same machine name, major version and minor version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
}

impl Dependency {
    pub fn new(machine_name: impl Into<String>, major_version: u32, minor_version: u32) -> Self {
        Self {
            machine_name: machine_name.into(),
            major_version,
            minor_version,
        }
    }

    pub fn key(&self) -> VersionKey {
        (self.major_version, self.minor_version)
    }

    /// Exact major/minor equality. Patch versions never participate.
    pub fn same_version(&self, other_major: u32, other_minor: u32) -> bool {
        self.major_version == other_major && self.minor_version == other_minor
    }

    /// Whether two constraints name the same library release.
    pub fn matches(&self, other: &Dependency) -> bool {
        self.machine_name == other.machine_name
            && self.same_version(other.major_version, other.minor_version)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}
