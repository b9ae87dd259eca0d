//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use super::PipelineState;
use crate::fetcher::UpstreamError;
use crate::tools::{ToolError, ToolOutput};

/// Longest tool diagnostic kept in an error message.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Failure of an individual pipeline step.
#[derive(Debug, Error)]
pub enum StepError {
    /// Tile fetch failed after its retry.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The downloaded data is implausibly small.
    #[error("Downloaded OSM data is too small ({size} bytes); the area may be empty")]
    EmptyResult { size: u64 },

    /// A delegated tool could not run or reported failure.
    #[error("{tool} failed ({}): {diagnostics}", describe_exit(.exit_code))]
    ExternalTool {
        tool: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    /// A step finished but its expected output is not there.
    #[error("{0}")]
    MissingArtifact(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StepError {
    /// Builds an error from a tool run that exited unsuccessfully.
    pub fn tool_failed(tool: impl Into<String>, output: &ToolOutput) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            exit_code: output.exit_code,
            diagnostics: tail(output.diagnostics(), MAX_DIAGNOSTIC_CHARS),
        }
    }
}

impl From<ToolError> for StepError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Io { source, .. } => StepError::Io(source),
            other => StepError::ExternalTool {
                tool: other.tool().to_string(),
                exit_code: None,
                diagnostics: other.to_string(),
            },
        }
    }
}

/// Errors that end a job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Job failed at step {step}: {source}")]
    StepFailed {
        step: PipelineState,
        #[source]
        source: StepError,
    },

    #[error("Job exceeded time limit of {limit_secs} seconds during {step}")]
    TimedOut { step: PipelineState, limit_secs: u64 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Failed to prepare job directory {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn step_failed(step: PipelineState, source: impl Into<StepError>) -> Self {
        Self::StepFailed {
            step,
            source: source.into(),
        }
    }

    /// The step the job was in when this error occurred, if known.
    pub fn step(&self) -> Option<PipelineState> {
        match self {
            PipelineError::StepFailed { step, .. } | PipelineError::TimedOut { step, .. } => {
                Some(*step)
            }
            PipelineError::InvalidTransition { from, .. } => Some(*from),
            PipelineError::Workspace { .. } => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skip = count - max_chars;
    format!("...{}", text.chars().skip(skip).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_names_step() {
        let err = PipelineError::step_failed(
            PipelineState::Splitting,
            StepError::tool_failed("splitter", &ToolOutput::failure(1, "java.lang.OutOfMemoryError")),
        );
        let message = err.to_string();
        assert!(message.contains("splitting"), "{}", message);
        assert!(message.contains("splitter failed (exit code 1)"), "{}", message);
        assert!(message.contains("OutOfMemoryError"), "{}", message);
        assert_eq!(err.step(), Some(PipelineState::Splitting));
    }

    #[test]
    fn test_tool_timeout_maps_to_external_tool() {
        let err: StepError = ToolError::Timeout {
            tool: "mkgmap".to_string(),
            timeout_secs: 300,
        }
        .into();
        match err {
            StepError::ExternalTool {
                tool, exit_code, ..
            } => {
                assert_eq!(tool, "mkgmap");
                assert_eq!(exit_code, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_long_diagnostics_are_truncated_from_the_front() {
        let stderr = format!("{}END", "x".repeat(5000));
        let err = StepError::tool_failed("osmium", &ToolOutput::failure(2, stderr));
        let StepError::ExternalTool { diagnostics, .. } = err else {
            panic!("expected ExternalTool");
        };
        assert!(diagnostics.starts_with("..."));
        assert!(diagnostics.ends_with("END"));
        assert_eq!(diagnostics.chars().count(), MAX_DIAGNOSTIC_CHARS + 3);
    }

    #[test]
    fn test_empty_result_message() {
        let err = StepError::EmptyResult { size: 42 };
        assert!(err.to_string().contains("too small"));
    }
}
