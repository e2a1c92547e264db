//! Subprocess invoker for an agent CLI with resumable chat sessions.
//!
//! Protocol: `<exe> agent create-chat` prints a session id on stdout, and
//! `<exe> agent --resume <id> --print --output-format text --model <m>
//! --force` reads one prompt from stdin and prints the reply on stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::invoker::{AgentInvokeError, AgentInvoker, AgentPrompt, AgentStartOutcome};

const MAX_SPAWN_ATTEMPTS: usize = 5;
const SPAWN_RETRY_DELAY_MS: u64 = 25;
const FAILURE_DETAIL_LIMIT: usize = 240;

/// Configuration for [`CliAgentInvoker`].
#[derive(Debug, Clone)]
pub struct CliAgentConfig {
    /// Agent executable name or path, resolved through `PATH` when bare.
    pub executable: String,
    /// Extra arguments appended to every invocation, after the built-in ones.
    pub extra_args: Vec<String>,
    /// Hard wall-clock limit for a single subprocess run.
    pub timeout_ms: u64,
}

/// Drives the agent CLI as a child process, one run per prompt.
pub struct CliAgentInvoker {
    config: CliAgentConfig,
}

impl CliAgentInvoker {
    pub fn new(config: CliAgentConfig) -> Result<Self, AgentInvokeError> {
        if config.executable.trim().is_empty() {
            return Err(AgentInvokeError::Unavailable(
                "agent executable is not configured".to_string(),
            ));
        }
        if config.timeout_ms == 0 {
            return Err(AgentInvokeError::Unavailable(
                "agent timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Opens a new chat session and returns its identifier.
    async fn create_chat(&self) -> Result<String, AgentInvokeError> {
        let output = self.run_agent(&["create-chat".to_string()], None).await?;
        let session_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if session_id.is_empty() {
            return Err(AgentInvokeError::Process {
                status: "0".to_string(),
                detail: "create-chat produced no session id".to_string(),
            });
        }
        Ok(session_id)
    }

    async fn run_agent(
        &self,
        args: &[String],
        stdin_text: Option<&str>,
    ) -> Result<std::process::Output, AgentInvokeError> {
        let mut command = Command::new(&self.config.executable);
        command.kill_on_drop(true);
        command.arg("agent");
        command.args(args);
        command.args(&self.config.extra_args);
        command.stdin(if stdin_text.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = spawn_with_text_file_busy_retry(&mut command)
            .await
            .map_err(|error| classify_spawn_error(&self.config.executable, &error))?;
        let prompt_text = stdin_text.map(str::to_owned);
        let run = async move {
            if let Some(text) = prompt_text {
                if let Some(mut stdin) = child.stdin.take() {
                    // Write failures surface through the exit status below.
                    let _ = stdin.write_all(text.as_bytes()).await;
                    let _ = stdin.shutdown().await;
                }
            }
            child.wait_with_output().await
        };

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let output = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| AgentInvokeError::Timeout {
                timeout_ms: self.config.timeout_ms,
            })?
            .map_err(|error| AgentInvokeError::Process {
                status: "unknown".to_string(),
                detail: error.to_string(),
            })?;
        if !output.status.success() {
            return Err(summarize_process_failure(&output));
        }
        Ok(output)
    }
}

#[async_trait]
impl AgentInvoker for CliAgentInvoker {
    async fn resume(
        &self,
        session_id: &str,
        prompt: &AgentPrompt,
    ) -> Result<String, AgentInvokeError> {
        let args = vec![
            "--resume".to_string(),
            session_id.to_string(),
            "--print".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
            "--model".to_string(),
            prompt.model.clone(),
            "--force".to_string(),
        ];
        let output = self.run_agent(&args, Some(&prompt.text)).await?;
        let response = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if response.is_empty() {
            return Err(AgentInvokeError::EmptyResponse);
        }
        tracing::debug!(
            session_id,
            response_chars = response.chars().count(),
            "agent resume completed"
        );
        Ok(response)
    }

    async fn start(&self, prompt: &AgentPrompt) -> Result<AgentStartOutcome, AgentInvokeError> {
        let session_id = self.create_chat().await?;
        let response = self.resume(&session_id, prompt).await?;
        Ok(AgentStartOutcome {
            response,
            session_id: Some(session_id),
        })
    }
}

/// Retries spawns that hit POSIX `ETXTBSY`, which happens when the executable
/// was written moments before being launched.
async fn spawn_with_text_file_busy_retry(command: &mut Command) -> std::io::Result<Child> {
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(error) => {
                let text_file_busy = error.raw_os_error() == Some(26);
                if !text_file_busy || attempt >= MAX_SPAWN_ATTEMPTS {
                    return Err(error);
                }
                tokio::time::sleep(Duration::from_millis(SPAWN_RETRY_DELAY_MS)).await;
            }
        }
    }
}

fn classify_spawn_error(executable: &str, error: &std::io::Error) -> AgentInvokeError {
    match error.kind() {
        std::io::ErrorKind::NotFound => AgentInvokeError::Unavailable(format!(
            "executable `{executable}` was not found on PATH"
        )),
        std::io::ErrorKind::PermissionDenied => {
            AgentInvokeError::Unavailable(format!("executable `{executable}` is not executable"))
        }
        _ => AgentInvokeError::Unavailable(format!("failed to spawn `{executable}`: {error}")),
    }
}

fn summarize_process_failure(output: &std::process::Output) -> AgentInvokeError {
    let status = output
        .status
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "terminated by signal".to_string());
    let stderr_text = String::from_utf8_lossy(&output.stderr);
    let stdout_text = String::from_utf8_lossy(&output.stdout);
    let source = if stderr_text.trim().is_empty() {
        stdout_text
    } else {
        stderr_text
    };
    AgentInvokeError::Process {
        status,
        detail: truncate_for_detail(source.trim(), FAILURE_DETAIL_LIMIT),
    }
}

fn truncate_for_detail(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}...")
}
