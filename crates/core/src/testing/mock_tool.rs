//! Mock external tool for testing.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::tools::{ExternalTool, ToolError, ToolOutput};

/// Side effect run on a successful invocation, given the call's arguments.
pub type ToolEffect = Arc<dyn Fn(&[String]) -> std::io::Result<()> + Send + Sync>;

/// A recorded invocation for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Mock implementation of the ExternalTool trait.
///
/// Succeeds by default without touching the filesystem. Attach an effect
/// with [`MockTool::with_effect`] to create the files a real tool would.
#[derive(Clone)]
pub struct MockTool {
    name: String,
    invocations: Arc<RwLock<Vec<ToolInvocation>>>,
    output: Arc<RwLock<ToolOutput>>,
    next_error: Arc<RwLock<Option<ToolError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    effect: Option<ToolEffect>,
}

impl fmt::Debug for MockTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTool")
            .field("name", &self.name)
            .field("has_effect", &self.effect.is_some())
            .finish()
    }
}

impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invocations: Arc::new(RwLock::new(Vec::new())),
            output: Arc::new(RwLock::new(ToolOutput::success())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            effect: None,
        }
    }

    pub fn with_effect(mut self, effect: ToolEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Make every following invocation exit with `code`.
    pub async fn set_exit(&self, code: i32, stderr: impl Into<String>) {
        *self.output.write().await = ToolOutput::failure(code, stderr);
    }

    /// The next invocation fails to run at all.
    pub async fn set_next_error(&self, error: ToolError) {
        *self.next_error.write().await = Some(error);
    }

    /// Simulate a slow tool. Exceeding the call's timeout yields `ToolError::Timeout`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.read().await.clone()
    }

    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }
}

#[async_trait]
impl ExternalTool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError> {
        self.invocations.write().await.push(ToolInvocation {
            args: args.to_vec(),
            timeout,
        });

        if let Some(delay) = *self.delay.read().await {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(ToolError::Timeout {
                    tool: self.name.clone(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let output = self.output.read().await.clone();
        if output.succeeded() {
            if let Some(effect) = &self.effect {
                effect(args).map_err(|e| ToolError::Io {
                    tool: self.name.clone(),
                    source: e,
                })?;
            }
        }
        Ok(output)
    }
}
