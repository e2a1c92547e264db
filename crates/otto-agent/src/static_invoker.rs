//! Deterministic invoker for tests and `--stub-agent` dry runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::invoker::{AgentInvokeError, AgentInvoker, AgentPrompt, AgentStartOutcome};

/// One prompt the stub received, kept for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvocation {
    /// `Some` for resume calls, `None` for fresh starts.
    pub session_id: Option<String>,
    pub model: String,
    pub prompt_text: String,
}

/// Canned-response invoker. Sessions are `stub-session-<n>` in creation
/// order, and every received prompt is recorded.
pub struct StaticAgentInvoker {
    reply: String,
    fail_resume: bool,
    unavailable: bool,
    next_session: AtomicU64,
    invocations: Mutex<Vec<RecordedInvocation>>,
}

impl StaticAgentInvoker {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail_resume: false,
            unavailable: false,
            next_session: AtomicU64::new(1),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Makes every resume call fail so callers exercise their
    /// fresh-session fallback.
    pub fn with_resume_failure(mut self) -> Self {
        self.fail_resume = true;
        self
    }

    /// Makes every call report the executable as unavailable.
    pub fn with_unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.lock_invocations().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.lock_invocations().len()
    }

    fn lock_invocations(&self) -> std::sync::MutexGuard<'_, Vec<RecordedInvocation>> {
        self.invocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, session_id: Option<&str>, prompt: &AgentPrompt) {
        self.lock_invocations().push(RecordedInvocation {
            session_id: session_id.map(str::to_owned),
            model: prompt.model.clone(),
            prompt_text: prompt.text.clone(),
        });
    }
}

#[async_trait]
impl AgentInvoker for StaticAgentInvoker {
    async fn resume(
        &self,
        session_id: &str,
        prompt: &AgentPrompt,
    ) -> Result<String, AgentInvokeError> {
        self.record(Some(session_id), prompt);
        if self.unavailable {
            return Err(AgentInvokeError::Unavailable(
                "stub agent marked unavailable".to_string(),
            ));
        }
        if self.fail_resume {
            return Err(AgentInvokeError::Process {
                status: "1".to_string(),
                detail: format!("stub rejected resume of session {session_id}"),
            });
        }
        Ok(self.reply.clone())
    }

    async fn start(&self, prompt: &AgentPrompt) -> Result<AgentStartOutcome, AgentInvokeError> {
        self.record(None, prompt);
        if self.unavailable {
            return Err(AgentInvokeError::Unavailable(
                "stub agent marked unavailable".to_string(),
            ));
        }
        let serial = self.next_session.fetch_add(1, Ordering::SeqCst);
        Ok(AgentStartOutcome {
            response: self.reply.clone(),
            session_id: Some(format!("stub-session-{serial}")),
        })
    }
}
