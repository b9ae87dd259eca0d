use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PipelineError, PipelineState};

/// The finished map file of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
}

/// One pipeline execution for a single bounding box.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    /// Working directory owned exclusively by this job.
    pub dir: PathBuf,
    pub state: PipelineState,
    pub progress: Option<String>,
    pub error: Option<String>,
    pub artifact: Option<ArtifactInfo>,
    /// Every state the job has entered, in order.
    pub history: Vec<PipelineState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            dir: dir.into(),
            state: PipelineState::Queued,
            progress: None,
            error: None,
            artifact: None,
            history: vec![PipelineState::Queued],
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the job forward, rejecting skipped, repeated or backward moves.
    pub fn transition(&mut self, to: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.history.push(to);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, artifact: ArtifactInfo) -> Result<(), PipelineError> {
        self.transition(PipelineState::Completed)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(PipelineState::Failed)?;
        self.error = Some(error.into());
        self.artifact = None;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("abc", "/data/jobs/abc");
        assert_eq!(job.state, PipelineState::Queued);
        assert_eq!(job.history, vec![PipelineState::Queued]);
        assert!(!job.is_finished());
    }

    #[test]
    fn test_full_happy_path() {
        let mut job = Job::new("abc", "/data/jobs/abc");
        for state in &PipelineState::SEQUENCE[1..5] {
            job.transition(*state).unwrap();
        }
        job.complete(ArtifactInfo {
            filename: "gmapsupp.img".to_string(),
            size: 2048,
        })
        .unwrap();

        assert_eq!(job.history, PipelineState::SEQUENCE.to_vec());
        assert!(job.is_finished());
        assert_eq!(job.artifact.as_ref().map(|a| a.size), Some(2048));
    }

    #[test]
    fn test_skipping_a_step_is_rejected() {
        let mut job = Job::new("abc", "/data/jobs/abc");
        job.transition(PipelineState::Downloading).unwrap();
        let err = job.transition(PipelineState::Splitting).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: PipelineState::Downloading,
                to: PipelineState::Splitting
            }
        ));
        assert_eq!(job.state, PipelineState::Downloading);
    }

    #[test]
    fn test_failed_job_keeps_error_and_cannot_move() {
        let mut job = Job::new("abc", "/data/jobs/abc");
        job.transition(PipelineState::Downloading).unwrap();
        job.fail("upstream down").unwrap();

        assert_eq!(job.state, PipelineState::Failed);
        assert_eq!(job.error.as_deref(), Some("upstream down"));
        assert!(job.transition(PipelineState::Converting).is_err());
        assert!(job.fail("again").is_err());
    }
}
