//! Platform event vocabulary
//!
//! Commit and content lifecycle operations emit structured events so the
//! host can keep an audit trail. Emission is filtered by a log level the
//! host configures; sinks receive ready-made envelopes with identity and
//! timestamp already assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// What happened, with just enough identity to find the subject again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    ContentCreated { content_id: String, title: String },
    ContentUpdated { content_id: String, title: String },
    ContentDeleted { content_id: String },
    ContentUpgraded { content_id: String, library: String },
    LibraryInstalled { library: String },
    LibraryPatched { library: String },
}

impl PlatformEvent {
    /// Whether this event is a state-changing action (as opposed to
    /// informational traffic a quieter log level drops).
    pub fn is_action(&self) -> bool {
        // Every variant in the current vocabulary mutates state; the
        // distinction matters once view/embed events join it
        true
    }
}

/// A recorded event with identity and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: PlatformEvent,
}

impl EventEnvelope {
    pub fn new(event: PlatformEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// How much event traffic the host wants recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    None,
    #[default]
    Actions,
    All,
}

impl LogLevel {
    pub fn should_log(&self, event: &PlatformEvent) -> bool {
        match self {
            LogLevel::None => false,
            LogLevel::Actions => event.is_action(),
            LogLevel::All => true,
        }
    }
}

/// Receives event envelopes the level filter lets through.
pub trait EventSink: Send {
    fn record(&mut self, envelope: EventEnvelope);
}

/// Level-filtering dispatcher in front of an optional sink.
pub struct EventDispatcher {
    sink: Option<Box<dyn EventSink>>,
    level: LogLevel,
}

impl EventDispatcher {
    pub fn new(sink: Option<Box<dyn EventSink>>, level: LogLevel) -> Self {
        Self { sink, level }
    }

    /// Dispatcher that drops everything.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            level: LogLevel::None,
        }
    }

    pub fn emit(&mut self, event: PlatformEvent) {
        if !self.level.should_log(&event) {
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        debug!(?event, "recording platform event");
        sink.record(EventEnvelope::new(event));
    }
}
