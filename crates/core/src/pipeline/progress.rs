//! Progress reporting for running jobs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::PipelineState;
use crate::queue::{JobQueue, TaskState};

/// Receives human-readable progress messages from pipeline steps.
#[async_trait]
pub trait ProgressEmitter: Send + Sync {
    async fn emit(&self, step: &str);
}

/// Publishes a job's progress to the job queue's status store.
pub struct QueueProgress {
    queue: Arc<dyn JobQueue>,
    job_id: String,
    stage: RwLock<PipelineState>,
    last_step: RwLock<Option<String>>,
}

impl QueueProgress {
    pub fn new(queue: Arc<dyn JobQueue>, job_id: impl Into<String>) -> Self {
        Self {
            queue,
            job_id: job_id.into(),
            stage: RwLock::new(PipelineState::Queued),
            last_step: RwLock::new(None),
        }
    }

    /// Sets the stage attached to subsequent messages.
    pub async fn set_stage(&self, stage: PipelineState) {
        *self.stage.write().await = stage;
    }

    pub async fn last_step(&self) -> Option<String> {
        self.last_step.read().await.clone()
    }
}

#[async_trait]
impl ProgressEmitter for QueueProgress {
    async fn emit(&self, step: &str) {
        let stage = *self.stage.read().await;
        *self.last_step.write().await = Some(step.to_string());
        debug!(job_id = %self.job_id, %stage, "{}", step);

        let state = TaskState::Progress {
            stage,
            step: step.to_string(),
        };
        // Status is best effort; a lost update must not fail the job.
        if let Err(e) = self.queue.update_state(&self.job_id, state).await {
            warn!(job_id = %self.job_id, "Failed to publish progress: {}", e);
        }
    }
}
