//! Map generation pipeline.
//!
//! A job moves `Queued -> Downloading -> Converting -> Splitting -> Compiling
//! -> Completed`, or drops to `Failed` from any active step. The
//! [`PipelineOrchestrator`] drives one job at a time and publishes progress
//! through the job queue.

mod error;
mod job;
mod orchestrator;
mod progress;
mod state;

pub use error::{PipelineError, StepError};
pub use job::{ArtifactInfo, Job};
pub use orchestrator::{OrchestratorConfig, PipelineOrchestrator};
pub use progress::{ProgressEmitter, QueueProgress};
pub use state::PipelineState;
