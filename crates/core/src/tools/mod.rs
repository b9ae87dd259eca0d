//! External map tooling.
//!
//! Format conversion, tile splitting, map compilation and tile merging are
//! all done by pre-existing command line tools. They sit behind the
//! [`ExternalTool`] capability so the pipeline can be driven by fakes in tests.

mod process;
mod toolchain;

pub use process::ProcessTool;
pub use toolchain::{
    MapToolchain, CONVERTED_FILENAME, SPLIT_DIRNAME, SPLIT_TEMPLATE_FILENAME,
};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Exit status and captured output of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best diagnostic text: stderr when present, stdout otherwise.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Failures to run a tool at all (as opposed to the tool reporting failure).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} not found at path: {program}")]
    NotFound { tool: String, program: PathBuf },

    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("I/O error running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::NotFound { tool, .. }
            | ToolError::Timeout { tool, .. }
            | ToolError::Io { tool, .. } => tool,
        }
    }
}

/// A command line tool the pipeline delegates to.
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Name used in logs, metrics and error messages.
    fn name(&self) -> &str;

    /// Runs the tool with `args`, killing it if it outlives `timeout`.
    async fn invoke(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_prefers_stderr() {
        let output = ToolOutput {
            exit_code: Some(1),
            stdout: "some progress".to_string(),
            stderr: "  Exception: out of memory\n".to_string(),
        };
        assert_eq!(output.diagnostics(), "Exception: out of memory");
    }

    #[test]
    fn test_diagnostics_falls_back_to_stdout() {
        let output = ToolOutput {
            exit_code: Some(2),
            stdout: "bad input\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.diagnostics(), "bad input");
        assert!(!output.succeeded());
    }

    #[test]
    fn test_signal_termination_is_not_success() {
        let output = ToolOutput {
            exit_code: None,
            ..Default::default()
        };
        assert!(!output.succeeded());
        assert!(ToolOutput::success().succeeded());
    }
}
