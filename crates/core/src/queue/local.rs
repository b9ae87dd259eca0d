use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::{JobQueue, QueueError, QueuedJob, TaskState};
use crate::geo::BoundingBox;

#[derive(Debug, Clone)]
struct JobRecord {
    state: TaskState,
    bbox: BoundingBox,
}

/// In-memory status store with channel delivery to workers.
pub struct LocalJobQueue {
    records: RwLock<HashMap<String, JobRecord>>,
    sender: mpsc::UnboundedSender<QueuedJob>,
}

impl LocalJobQueue {
    /// Creates the queue and the receiving end workers consume.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            records: RwLock::new(HashMap::new()),
            sender,
        };
        (queue, receiver)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// The bounding box a job was submitted with.
    pub async fn request(&self, job_id: &str) -> Option<BoundingBox> {
        self.records.read().await.get(job_id).map(|r| r.bbox)
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, bbox: BoundingBox) -> Result<String, QueueError> {
        let id = uuid::Uuid::new_v4().to_string();

        self.records.write().await.insert(
            id.clone(),
            JobRecord {
                state: TaskState::Pending,
                bbox,
            },
        );

        if self
            .sender
            .send(QueuedJob {
                id: id.clone(),
                bbox,
            })
            .is_err()
        {
            self.records.write().await.remove(&id);
            return Err(QueueError::Closed);
        }

        debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn get_state(&self, job_id: &str) -> Result<TaskState, QueueError> {
        self.records
            .read()
            .await
            .get(job_id)
            .map(|r| r.state.clone())
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))
    }

    async fn update_state(&self, job_id: &str, state: TaskState) -> Result<(), QueueError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        record.state = state;
        Ok(())
    }
}
