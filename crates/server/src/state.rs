use std::sync::Arc;
use trailforge_core::{AreaLimits, ArtifactServer, Config, Geocoder, JobQueue};

/// Shared application state
pub struct AppState {
    queue: Arc<dyn JobQueue>,
    artifacts: ArtifactServer,
    geocoder: Arc<dyn Geocoder>,
    limits: AreaLimits,
}

impl AppState {
    pub fn new(config: &Config, queue: Arc<dyn JobQueue>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            queue,
            artifacts: ArtifactServer::from_config(&config.storage),
            geocoder,
            limits: AreaLimits::from(&config.limits),
        }
    }

    pub fn queue(&self) -> &dyn JobQueue {
        self.queue.as_ref()
    }

    pub fn artifacts(&self) -> &ArtifactServer {
        &self.artifacts
    }

    pub fn geocoder(&self) -> &dyn Geocoder {
        self.geocoder.as_ref()
    }

    pub fn limits(&self) -> &AreaLimits {
        &self.limits
    }
}
