//! # h5p-upgrade
//!
//! The content upgrade engine. Stored content parameters are tied to the
//! library version that created them; when a newer minor or major
//! version is installed, each content item's parameters are walked
//! through the library's registered upgrade transitions, strictly in
//! version order.
//!
//! Jobs run in isolated tasks and talk to the host through
//! [`engine::EngineEvent`]; [`protocol`] carries the serde wire forms of
//! the same conversation.

pub mod engine;
pub mod protocol;
pub mod transforms;

pub use engine::{EngineConfig, EngineEvent, UpgradeEngine, UpgradeError, UpgradeJob};
pub use protocol::{ContentVersion, EngineMessage, HostMessage, LoadedLibraryInfo};
pub use transforms::{ScriptRegistry, Transform, UpgradeLibrary, UpgradeScript};
