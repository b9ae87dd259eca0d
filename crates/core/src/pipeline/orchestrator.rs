//! Per-job state machine driving download, convert, split and compile.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::{
    ArtifactInfo, Job, PipelineError, PipelineState, ProgressEmitter, QueueProgress, StepError,
};
use crate::config::Config;
use crate::download::DownloadCoordinator;
use crate::geo::BoundingBox;
use crate::metrics::{JOBS_TOTAL, JOB_DURATION, STEP_DURATION};
use crate::queue::{JobQueue, TaskState};
use crate::tools::MapToolchain;

/// Settings the orchestrator needs from the global configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Parent of all per-job directories.
    pub data_dir: PathBuf,
    pub artifact_filename: String,
    /// A job running longer than this is failed.
    pub hard_limit: Duration,
    /// Crossing this only logs a warning.
    pub soft_limit: Duration,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dir: config.storage.data_dir.clone(),
            artifact_filename: config.storage.artifact_filename.clone(),
            hard_limit: config.jobs.hard_limit(),
            soft_limit: config.jobs.soft_limit(),
        }
    }
}

/// Runs jobs through the pipeline, one invocation per job.
pub struct PipelineOrchestrator {
    coordinator: Arc<DownloadCoordinator>,
    toolchain: Arc<MapToolchain>,
    queue: Arc<dyn JobQueue>,
    config: OrchestratorConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        coordinator: Arc<DownloadCoordinator>,
        toolchain: Arc<MapToolchain>,
        queue: Arc<dyn JobQueue>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            coordinator,
            toolchain,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.config.data_dir.join(job_id)
    }

    /// Runs one job to a terminal state and records the outcome in the queue.
    ///
    /// Step failures never escape: they end up on the returned [`Job`] and in
    /// the queue as [`TaskState::Failure`]. The job directory is kept either way.
    pub async fn run(&self, job_id: &str, bbox: BoundingBox) -> Job {
        let started = Instant::now();
        let mut job = Job::new(job_id, self.job_dir(job_id));
        let progress = QueueProgress::new(self.queue.clone(), job_id);
        let hard_limit = self.config.hard_limit;
        let soft_limit = self.config.soft_limit;

        info!(job_id, "Starting map job for {:?}", bbox);

        let work = async {
            let steps = self.execute(&mut job, &bbox, &progress);
            tokio::pin!(steps);
            tokio::select! {
                result = &mut steps => result,
                _ = tokio::time::sleep(soft_limit) => {
                    warn!(job_id, "Job passed soft time limit of {}s", soft_limit.as_secs());
                    steps.await
                }
            }
        };
        let timed = tokio::time::timeout(hard_limit, work).await;

        let outcome = match timed {
            Ok(result) => result,
            Err(_) => Err(PipelineError::TimedOut {
                step: job.state,
                limit_secs: hard_limit.as_secs(),
            }),
        };

        if let Some(step) = progress.last_step().await {
            job.progress = Some(step);
        }

        let result_label = match outcome {
            Ok(artifact) => match job.complete(artifact.clone()) {
                Ok(()) => {
                    info!(
                        job_id,
                        "Job completed: {} ({} bytes) in {:?}",
                        artifact.filename,
                        artifact.size,
                        started.elapsed()
                    );
                    self.publish(job_id, TaskState::Success { artifact }).await;
                    "completed"
                }
                Err(e) => self.record_failure(&mut job, e).await,
            },
            Err(e) => self.record_failure(&mut job, e).await,
        };

        JOBS_TOTAL.with_label_values(&[result_label]).inc();
        JOB_DURATION
            .with_label_values(&[result_label])
            .observe(started.elapsed().as_secs_f64());

        job
    }

    async fn execute(
        &self,
        job: &mut Job,
        bbox: &BoundingBox,
        progress: &QueueProgress,
    ) -> Result<ArtifactInfo, PipelineError> {
        tokio::fs::create_dir_all(&job.dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: job.dir.clone(),
                source,
            })?;

        self.advance(job, PipelineState::Downloading, progress).await?;
        let raw = run_step(
            PipelineState::Downloading,
            self.coordinator.download(bbox, &job.dir, progress),
        )
        .await?;

        self.advance(job, PipelineState::Converting, progress).await?;
        let pbf = run_step(
            PipelineState::Converting,
            self.toolchain.convert(&raw, &job.dir),
        )
        .await?;

        self.advance(job, PipelineState::Splitting, progress).await?;
        let split_dir = run_step(
            PipelineState::Splitting,
            self.toolchain.split(&pbf, &job.dir),
        )
        .await?;

        self.advance(job, PipelineState::Compiling, progress).await?;
        let filename = self.config.artifact_filename.as_str();
        let artifact = run_step(
            PipelineState::Compiling,
            self.toolchain.compile(&split_dir, &job.dir, filename),
        )
        .await?;

        match tokio::fs::metadata(&artifact).await {
            Ok(meta) if meta.is_file() => Ok(ArtifactInfo {
                filename: filename.to_string(),
                size: meta.len(),
            }),
            _ => Err(PipelineError::step_failed(
                PipelineState::Compiling,
                StepError::MissingArtifact(format!("mkgmap did not produce {}", filename)),
            )),
        }
    }

    async fn advance(
        &self,
        job: &mut Job,
        to: PipelineState,
        progress: &QueueProgress,
    ) -> Result<(), PipelineError> {
        job.transition(to)?;
        info!(job_id = %job.id, "Job entered {}", to);

        progress.set_stage(to).await;
        if let Some(message) = to.progress_message() {
            job.progress = Some(message.to_string());
            progress.emit(message).await;
        }
        Ok(())
    }

    async fn record_failure(&self, job: &mut Job, err: PipelineError) -> &'static str {
        let message = err.to_string();
        let failed_at = err.step().unwrap_or(job.state);
        error!(job_id = %job.id, "{}", message);

        if let Err(e) = job.fail(message.clone()) {
            warn!(job_id = %job.id, "Could not mark job failed: {}", e);
        }
        self.discard_artifact(job).await;

        self.publish(
            &job.id,
            TaskState::Failure {
                error: message,
                failed_at: Some(failed_at),
            },
        )
        .await;

        if matches!(err, PipelineError::TimedOut { .. }) {
            "timed_out"
        } else {
            "failed"
        }
    }

    /// Removes a half-written artifact so a failed job never serves one.
    async fn discard_artifact(&self, job: &Job) {
        let path = job.dir.join(&self.config.artifact_filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => warn!(job_id = %job.id, "Removed partial artifact {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %job.id, "Failed to remove {}: {}", path.display(), e),
        }
    }

    async fn publish(&self, job_id: &str, state: TaskState) {
        if let Err(e) = self.queue.update_state(job_id, state).await {
            warn!(job_id, "Failed to record job state: {}", e);
        }
    }
}

async fn run_step<T, F>(step: PipelineState, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, StepError>>,
{
    let started = Instant::now();
    let result = fut.await;
    let label = if result.is_ok() { "success" } else { "failure" };
    STEP_DURATION
        .with_label_values(&[step.as_str(), label])
        .observe(started.elapsed().as_secs_f64());
    result.map_err(|e| PipelineError::step_failed(step, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::TileFetcher;
    use crate::queue::LocalJobQueue;
    use crate::testing::fixtures::{test_config, working_toolchain};
    use crate::testing::{MockTileSource, RecordingEmitter};
    use tempfile::TempDir;

    fn assert_send<T: Send>(_: &T) {}

    fn orchestrator(dir: &TempDir, max_concurrent_fetches: usize) -> PipelineOrchestrator {
        let mut config = test_config(dir.path());
        config.overpass.max_concurrent_fetches = max_concurrent_fetches;
        let tools = working_toolchain();
        let toolchain = Arc::new(tools.toolchain.clone());
        let coordinator = Arc::new(DownloadCoordinator::new(
            TileFetcher::from_config(Arc::new(MockTileSource::new()), &config.overpass),
            Arc::clone(&toolchain),
            &config.overpass,
        ));
        let (queue, _rx) = LocalJobQueue::new();
        PipelineOrchestrator::new(
            coordinator,
            toolchain,
            Arc::new(queue),
            OrchestratorConfig::from_config(&config),
        )
    }

    #[test]
    fn test_job_future_can_be_spawned() {
        let dir = TempDir::new().unwrap();
        let bbox = BoundingBox::new(45.0, 7.0, 46.0, 8.0);

        for fetches in [1, 4] {
            let orchestrator = orchestrator(&dir, fetches);
            let job = orchestrator.run("job", bbox);
            assert_send(&job);
        }
    }

    #[test]
    fn test_download_future_can_be_spawned() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, 4);
        let emitter = RecordingEmitter::new();
        let bbox = BoundingBox::new(45.0, 7.0, 46.0, 8.0);

        let download = orchestrator
            .coordinator
            .download(&bbox, dir.path(), &emitter);
        assert_send(&download);
    }
}
