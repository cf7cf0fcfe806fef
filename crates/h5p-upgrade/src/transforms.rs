//! Upgrade scripts
//!
//! A library's upgrade script is an ordered map from a (major, minor)
//! version to the transform that brings parameters up to that version.
//! Upgrading from `old` to `new` applies every registered transition
//! strictly above `old` and at or below `new`, ascending, never skipping
//! an intermediate version.

use crate::protocol::{ContentVersion, LoadedLibraryInfo};
use h5p_core::version::VersionKey;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One parameter transform. Failures are arbitrary host errors, so the
/// error type stays open.
pub type Transform = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Ordered transforms for one library.
#[derive(Clone, Default)]
pub struct UpgradeScript {
    transitions: BTreeMap<VersionKey, Transform>,
}

impl UpgradeScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transform that upgrades parameters *to* this
    /// version. Replaces any previous registration for the version.
    pub fn register<F>(mut self, major: u32, minor: u32, transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.transitions.insert((major, minor), Arc::new(transform));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Registered transition versions, ascending.
    pub fn versions(&self) -> Vec<ContentVersion> {
        self.transitions
            .keys()
            .map(|&(major, minor)| ContentVersion::new(major, minor))
            .collect()
    }

    /// The transitions to run for an upgrade from `old` to `new`:
    /// every registered version `v` with `old < v <= new`, ascending.
    pub fn transitions_between(
        &self,
        old: ContentVersion,
        new: ContentVersion,
    ) -> Vec<(ContentVersion, Transform)> {
        use std::ops::Bound::{Excluded, Included};
        if old >= new {
            return Vec::new();
        }
        let selected: Vec<_> = self
            .transitions
            .range((Excluded(old.key()), Included(new.key())))
            .map(|(&(major, minor), transform)| {
                (ContentVersion::new(major, minor), transform.clone())
            })
            .collect();
        debug!(
            %old,
            %new,
            transitions = selected.len(),
            "selected upgrade transitions"
        );
        selected
    }
}

impl std::fmt::Debug for UpgradeScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeScript")
            .field("versions", &self.versions())
            .finish()
    }
}

/// What a `loadLibrary` request resolves to.
#[derive(Debug, Clone)]
pub struct UpgradeLibrary {
    pub name: String,
    pub version: ContentVersion,
    /// `None` when the library registers no transforms; the upgrade is
    /// then an identity step
    pub upgrades: Option<UpgradeScript>,
}

impl UpgradeLibrary {
    /// The wire description of this library: name, version, and the
    /// registered transition versions.
    pub fn describe(&self) -> LoadedLibraryInfo {
        LoadedLibraryInfo {
            name: self.name.clone(),
            version: self.version,
            upgrade_versions: self
                .upgrades
                .as_ref()
                .map(|script| script.versions())
                .unwrap_or_default(),
        }
    }
}

/// Host-side registry of upgrade scripts by library machine name.
///
/// Transform closures never travel over a wire; a bridged host answers
/// `loadLibrary` by resolving the announced [`LoadedLibraryInfo`]
/// against the scripts registered here.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, UpgradeScript>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, script: UpgradeScript) {
        self.scripts.insert(name.into(), script);
    }

    /// Resolve a wire description into the library a load reply carries.
    /// A library without a registered script resolves to an identity
    /// upgrade.
    pub fn resolve(&self, info: &LoadedLibraryInfo) -> UpgradeLibrary {
        UpgradeLibrary {
            name: info.name.clone(),
            version: info.version,
            upgrades: self.scripts.get(&info.name).cloned(),
        }
    }
}
