//! Content upgrade engine
//!
//! Each submitted job runs in its own tokio task with fully isolated
//! state; a failing or hanging job never touches another. The engine
//! asks the host for upgrade code through a `LoadLibrary` event carrying
//! a per-job reply channel, then applies the ordered transitions and
//! reports a terminal `Done` or `Failed` event.

use crate::protocol::ContentVersion;
use crate::transforms::UpgradeLibrary;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Why a job failed. Failures are terminal per job only.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("Failed to load library {name}: {message}")]
    LoadFailed { name: String, message: String },

    #[error("Timed out waiting for library {name}")]
    LoadTimeout { name: String },

    #[error("Upgrade engine is shut down")]
    EngineShutDown,

    #[error("Transform to {version} failed: {message}")]
    TransformFailed { version: ContentVersion, message: String },
}

/// One content item's upgrade request.
#[derive(Debug, Clone)]
pub struct UpgradeJob {
    pub id: String,
    pub name: String,
    pub old_version: ContentVersion,
    pub new_version: ContentVersion,
    pub params: Value,
}

/// Events the engine emits to its host.
#[derive(Debug)]
pub enum EngineEvent {
    /// The job needs its library's upgrade code. Answer on `reply`;
    /// dropping it or exceeding the load timeout fails the job.
    LoadLibrary {
        name: String,
        version: ContentVersion,
        reply: oneshot::Sender<Result<UpgradeLibrary, String>>,
    },
    Done {
        id: String,
        params: Value,
    },
    Failed {
        id: String,
        error: UpgradeError,
    },
}

impl EngineEvent {
    /// The wire form of this event for hosts bridging the protocol. The
    /// reply channel of a load request stays on the in-process side; the
    /// bridge pairs the eventual `libraryLoaded` answer back to it.
    pub fn to_message(&self) -> crate::protocol::EngineMessage {
        use crate::protocol::EngineMessage;
        match self {
            EngineEvent::LoadLibrary { name, version, .. } => EngineMessage::LoadLibrary {
                name: name.clone(),
                version: *version,
            },
            EngineEvent::Done { id, params } => EngineMessage::Done {
                id: id.clone(),
                params: params.clone(),
            },
            EngineEvent::Failed { id, error } => EngineMessage::Error {
                id: id.clone(),
                err: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a job waits for a `LoadLibrary` answer
    pub load_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// Spawns and tracks upgrade jobs.
pub struct UpgradeEngine {
    events: mpsc::Sender<EngineEvent>,
    config: EngineConfig,
}

impl UpgradeEngine {
    /// Create an engine and the event stream its host consumes.
    pub fn new(config: EngineConfig) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, receiver) = mpsc::channel(64);
        (Self { events, config }, receiver)
    }

    /// Start one job in its own task. Returns immediately; the outcome
    /// arrives on the event stream as `Done` or `Failed`.
    pub fn submit(&self, job: UpgradeJob) {
        let events = self.events.clone();
        let load_timeout = self.config.load_timeout;
        tokio::spawn(async move {
            let id = job.id.clone();
            debug!(job = %id, library = %job.name, "upgrade job started");
            let outcome = run_job(job, &events, load_timeout).await;
            let terminal = match outcome {
                Ok(params) => EngineEvent::Done { id, params },
                Err(error) => {
                    warn!(job = %id, %error, "upgrade job failed");
                    EngineEvent::Failed { id, error }
                }
            };
            // A closed receiver means the host is gone; nothing to report
            let _ = events.send(terminal).await;
        });
    }
}

async fn run_job(
    job: UpgradeJob,
    events: &mpsc::Sender<EngineEvent>,
    load_timeout: Duration,
) -> Result<Value, UpgradeError> {
    let library = load_library(&job.name, job.new_version, events, load_timeout).await?;

    let Some(script) = library.upgrades else {
        // No transforms registered: identity upgrade
        debug!(library = %job.name, "no upgrade script, parameters unchanged");
        return Ok(job.params);
    };

    let mut params = job.params;
    for (version, transform) in script.transitions_between(job.old_version, job.new_version) {
        debug!(library = %job.name, %version, "applying transition");
        params = transform(params).map_err(|e| UpgradeError::TransformFailed {
            version,
            message: e.to_string(),
        })?;
    }
    info!(
        job = %job.id,
        library = %job.name,
        from = %job.old_version,
        to = %job.new_version,
        "upgrade complete"
    );
    Ok(params)
}

async fn load_library(
    name: &str,
    version: ContentVersion,
    events: &mpsc::Sender<EngineEvent>,
    load_timeout: Duration,
) -> Result<UpgradeLibrary, UpgradeError> {
    let (reply, answer) = oneshot::channel();
    events
        .send(EngineEvent::LoadLibrary {
            name: name.to_string(),
            version,
            reply,
        })
        .await
        .map_err(|_| UpgradeError::EngineShutDown)?;

    match timeout(load_timeout, answer).await {
        Err(_) => Err(UpgradeError::LoadTimeout {
            name: name.to_string(),
        }),
        // A dropped reply sender also fails the load
        Ok(Err(_)) => Err(UpgradeError::LoadFailed {
            name: name.to_string(),
            message: "library provider went away".to_string(),
        }),
        Ok(Ok(Err(message))) => Err(UpgradeError::LoadFailed {
            name: name.to_string(),
            message,
        }),
        Ok(Ok(Ok(library))) => Ok(library),
    }
}
