//! Tools backed by a real child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExternalTool, ToolError, ToolOutput};
use crate::config::ToolsConfig;
use crate::metrics::{TOOL_DURATION, TOOL_INVOCATIONS};

/// Spawns `program` with a fixed argument prefix followed by per-call args.
#[derive(Debug, Clone)]
pub struct ProcessTool {
    name: String,
    program: PathBuf,
    base_args: Vec<String>,
}

impl ProcessTool {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    /// The osmium command line tool.
    pub fn osmium(config: &ToolsConfig) -> Self {
        Self::new("osmium", &config.osmium_path)
    }

    /// A Java tool shipped as an executable jar.
    pub fn java_jar(name: impl Into<String>, config: &ToolsConfig, jar: &Path) -> Self {
        Self::new(name, &config.java_path).with_base_args(vec![
            format!("-Xmx{}", config.java_max_heap),
            "-jar".to_string(),
            jar.to_string_lossy().to_string(),
        ])
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ExternalTool for ProcessTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError> {
        debug!("Running {} {:?} {:?}", self.name, self.base_args, args);
        let start = Instant::now();

        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound {
                        tool: self.name.clone(),
                        program: self.program.clone(),
                    }
                } else {
                    ToolError::Io {
                        tool: self.name.clone(),
                        source: e,
                    }
                }
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::Io {
                tool: self.name.clone(),
                source: e,
            })?,
            Err(_) => {
                warn!("{} exceeded {:?}, killed", self.name, timeout);
                TOOL_INVOCATIONS
                    .with_label_values(&[self.name.as_str(), "timeout"])
                    .inc();
                return Err(ToolError::Timeout {
                    tool: self.name.clone(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        let label = if result.succeeded() { "success" } else { "failure" };
        TOOL_INVOCATIONS.with_label_values(&[self.name.as_str(), label]).inc();
        TOOL_DURATION
            .with_label_values(&[self.name.as_str()])
            .observe(start.elapsed().as_secs_f64());

        debug!(
            "{} finished with {:?} in {:?}",
            self.name,
            result.exit_code,
            start.elapsed()
        );
        Ok(result)
    }
}
