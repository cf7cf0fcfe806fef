//! Upgrade message protocol
//!
//! In-process the engine talks over typed channels; these serde forms
//! exist for hosts that bridge the protocol over a wire (a worker
//! process, a browser runtime). Messages are tagged by `action`.

use crate::engine::UpgradeJob;
use h5p_core::version::VersionKey;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A content version at major.minor granularity, written `"1.2"` on the
/// wire. Patch builds never change parameter shape, so upgrades ignore
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentVersion {
    pub major: u32,
    pub minor: u32,
}

impl ContentVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn key(&self) -> VersionKey {
        (self.major, self.minor)
    }
}

impl fmt::Display for ContentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ContentVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("not a major.minor version: {s}"))?;
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| format!("not a major.minor version: {s}"))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
        })
    }
}

impl Serialize for ContentVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Messages a host sends into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostMessage {
    /// Start upgrading one content item's parameters.
    #[serde(rename_all = "camelCase")]
    NewJob {
        id: String,
        name: String,
        old_version: ContentVersion,
        new_version: ContentVersion,
        params: Value,
    },
    /// Answer to a `loadLibrary` request.
    #[serde(rename_all = "camelCase")]
    LibraryLoaded { library: LoadedLibraryInfo },
}

impl HostMessage {
    /// The engine job a `newJob` message starts; `None` for the other
    /// variants.
    pub fn into_job(self) -> Option<UpgradeJob> {
        match self {
            HostMessage::NewJob {
                id,
                name,
                old_version,
                new_version,
                params,
            } => Some(UpgradeJob {
                id,
                name,
                old_version,
                new_version,
                params,
            }),
            HostMessage::LibraryLoaded { .. } => None,
        }
    }
}

/// Messages the engine sends back to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EngineMessage {
    /// The engine needs a library's upgrade code.
    #[serde(rename_all = "camelCase")]
    LoadLibrary { name: String, version: ContentVersion },
    /// A job finished; `params` carries the upgraded parameters.
    #[serde(rename_all = "camelCase")]
    Done { id: String, params: Value },
    /// A job failed; nothing of its parameters is returned.
    #[serde(rename_all = "camelCase")]
    Error { id: String, err: String },
}

/// Wire form of a loaded library: the upgrade code travels as an opaque
/// script reference, resolved host-side into registered transforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedLibraryInfo {
    pub name: String,
    pub version: ContentVersion,
    /// Registered transition versions, ascending
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrade_versions: Vec<ContentVersion>,
}
