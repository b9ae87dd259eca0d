//! Job queue contract and the in-process adapter.
//!
//! The pipeline only needs to enqueue work, publish state and read it back.
//! [`LocalJobQueue`] keeps that status store in memory and hands jobs to a
//! [`WorkerPool`] over a channel.

mod local;
mod worker;

pub use local::LocalJobQueue;
pub use worker::WorkerPool;

use async_trait::async_trait;
use thiserror::Error;

use crate::geo::BoundingBox;
use crate::pipeline::{ArtifactInfo, PipelineState};

/// Last published state of a job, as seen by pollers.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Accepted, not yet picked up by a worker.
    Pending,
    /// Running; `step` is the latest progress message.
    Progress { stage: PipelineState, step: String },
    Success { artifact: ArtifactInfo },
    Failure {
        error: String,
        failed_at: Option<PipelineState>,
    },
    /// A state this adapter does not model, passed through verbatim.
    Other(String),
}

impl TaskState {
    pub fn state_type(&self) -> &str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Progress { .. } => "progress",
            TaskState::Success { .. } => "success",
            TaskState::Failure { .. } => "failure",
            TaskState::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success { .. } | TaskState::Failure { .. })
    }
}

/// A job handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job queue is closed")]
    Closed,
}

/// Enqueue work, publish state, read state.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Accepts a validated bounding box and returns the new job id.
    async fn enqueue(&self, bbox: BoundingBox) -> Result<String, QueueError>;

    async fn get_state(&self, job_id: &str) -> Result<TaskState, QueueError>;

    async fn update_state(&self, job_id: &str, state: TaskState) -> Result<(), QueueError>;
}
