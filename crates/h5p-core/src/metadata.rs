//! Content metadata handling
//!
//! Content items carry a fixed, bounded metadata field set. Text fields
//! have per-field length caps; over-length values are truncated rather
//! than rejected, matching how the storage layer has always treated
//! metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_SOURCE: usize = 255;
const MAX_LICENSE: usize = 32;
const MAX_LICENSE_VERSION: usize = 10;
const MAX_LICENSE_EXTRAS: usize = 5000;
const MAX_AUTHOR_COMMENTS: usize = 5000;

/// Metadata attached to one content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_extras: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
}

impl ContentMetadata {
    /// Apply the per-field length caps, truncating on character
    /// boundaries. Returns self for chaining.
    pub fn sanitize(mut self) -> Self {
        truncate_field(&mut self.source, MAX_SOURCE);
        truncate_field(&mut self.license, MAX_LICENSE);
        truncate_field(&mut self.license_version, MAX_LICENSE_VERSION);
        truncate_field(&mut self.license_extras, MAX_LICENSE_EXTRAS);
        truncate_field(&mut self.author_comments, MAX_AUTHOR_COMMENTS);
        self
    }
}

fn truncate_field(field: &mut Option<String>, max_chars: usize) {
    if let Some(value) = field {
        if value.chars().count() > max_chars {
            *value = value.chars().take(max_chars).collect();
        }
    }
}
