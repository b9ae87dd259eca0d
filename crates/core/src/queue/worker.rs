use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::QueuedJob;
use crate::pipeline::{PipelineOrchestrator, PipelineState};

/// Runs delivered jobs, at most `max_concurrent` at a time.
pub struct WorkerPool {
    orchestrator: Arc<PipelineOrchestrator>,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Starts consuming `receiver` in the background.
    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<QueuedJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Consumes jobs until the sending side closes.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<QueuedJob>) {
        info!(
            "Worker pool started ({} concurrent jobs)",
            self.permits.available_permits()
        );

        while let Some(queued) = receiver.recv().await {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let orchestrator = self.orchestrator.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let job = orchestrator.run(&queued.id, queued.bbox).await;
                if job.state == PipelineState::Failed {
                    warn!(
                        job_id = %job.id,
                        "Job failed: {}",
                        job.error.as_deref().unwrap_or("unknown error")
                    );
                }
            });
        }

        info!("Job channel closed, worker pool stopping");
    }
}
