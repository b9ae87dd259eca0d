//! Progress emitter that records messages.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::pipeline::ProgressEmitter;

/// Captures every emitted progress message in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    steps: Arc<RwLock<Vec<String>>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn steps(&self) -> Vec<String> {
        self.steps.read().await.clone()
    }
}

#[async_trait]
impl ProgressEmitter for RecordingEmitter {
    async fn emit(&self, step: &str) {
        self.steps.write().await.push(step.to_string());
    }
}
