//! Invoker trait and shared request/response types.

use async_trait::async_trait;
use thiserror::Error;

/// One prompt handed to the agent, with the model it should run under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPrompt {
    pub text: String,
    pub model: String,
}

impl AgentPrompt {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
        }
    }
}

/// Result of starting a fresh agent conversation.
///
/// `session_id` is `Some` when the backend hands out a resumable handle;
/// later turns in the same thread should prefer
/// [`AgentInvoker::resume`] with that handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStartOutcome {
    pub response: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum AgentInvokeError {
    /// The agent executable cannot run at all (missing binary, permission
    /// denied). Callers degrade to pending-manual handling instead of
    /// treating this as a processing failure.
    #[error("agent executable unavailable: {0}")]
    Unavailable(String),
    /// The subprocess exceeded the configured wait and was killed.
    #[error("agent invocation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The subprocess ran but exited unsuccessfully.
    #[error("agent process failed with status {status}: {detail}")]
    Process { status: String, detail: String },
    /// The subprocess exited cleanly but produced no usable text.
    #[error("agent returned an empty response")]
    EmptyResponse,
}

impl AgentInvokeError {
    /// True for errors that mean "nobody can be invoked here", as opposed to
    /// a run that was attempted and failed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Abstraction over the external coding agent.
///
/// `resume` sends one prompt into an existing session. `start` opens a new
/// session, sends the prompt, and reports the handle (when the backend has
/// one) so the caller can persist it for later turns.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn resume(&self, session_id: &str, prompt: &AgentPrompt)
        -> Result<String, AgentInvokeError>;

    async fn start(&self, prompt: &AgentPrompt) -> Result<AgentStartOutcome, AgentInvokeError>;
}
