//! Agent session orchestration for one review comment.
//!
//! Owns the per-thread work directory, the repository checkout, prompt
//! assembly, and the resume-first invocation flow. Every outcome is mirrored
//! into `agent-response.txt`: an interrupted delivery can be retried without
//! re-invoking the agent, and a human can complete a pending invocation by
//! writing the answer into that file. Work files are never deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use otto_agent::{AgentInvoker, AgentPrompt};
use otto_core::{sanitize_for_path, utc_now_rfc3339, write_text_atomic};
use otto_review::{render_instructions, InstructionContext, ReviewMode, Thread};

pub(super) const PENDING_MANUAL_MARKER: &str = "PENDING_MANUAL_INVOCATION";
pub(super) const SUCCESS_PREFIX: &str = "SUCCESS:";
pub(super) const FAILED_PREFIX: &str = "FAILED:";
pub(super) const RESPONSE_FILE_NAME: &str = "agent-response.txt";

const CONTEXT_FILE_NAME: &str = "context.md";
const INSTRUCTIONS_FILE_NAME: &str = "instructions.md";
const REQUEST_FILE_NAME: &str = "agent-request.json";
const PROMPT_FILE_NAME: &str = "combined-prompt.md";

#[derive(Clone)]
pub(super) struct AgentSessionConfig {
    pub(super) state_dir: PathBuf,
    pub(super) checkout_dir: Option<PathBuf>,
    pub(super) template_dir: Option<PathBuf>,
    pub(super) default_model: String,
    pub(super) ask_model: Option<String>,
    pub(super) plan_model: Option<String>,
    pub(super) implement_model: Option<String>,
}

pub(super) struct AgentRunRequest {
    pub(super) pr_number: u64,
    pub(super) thread_id: String,
    pub(super) comment_id: u64,
    pub(super) mode: ReviewMode,
    pub(super) branch: String,
    pub(super) context_document: String,
}

#[derive(Debug)]
pub(super) enum AgentRunOutcome {
    Succeeded {
        response: String,
        new_session_id: Option<String>,
        reused_previous: bool,
    },
    PendingManual,
    Failed {
        detail: String,
    },
}

#[derive(Serialize)]
struct AgentWorkRequest<'a> {
    pr_number: u64,
    thread_id: &'a str,
    comment_id: u64,
    mode: &'a str,
    branch: &'a str,
    timestamp: String,
}

pub(super) struct AgentSessionRunner {
    config: AgentSessionConfig,
    invoker: Arc<dyn AgentInvoker>,
}

impl AgentSessionRunner {
    pub(super) fn new(config: AgentSessionConfig, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { config, invoker }
    }

    pub(super) fn work_dir(&self, thread_id: &str) -> PathBuf {
        self.config
            .state_dir
            .join(format!(".agent-work-{}", sanitize_for_path(thread_id)))
    }

    /// Runs the agent for one comment. Returns `Ok` with a domain outcome for
    /// everything invocation-related; `Err` is reserved for local file-IO
    /// problems.
    pub(super) async fn run(
        &self,
        request: &AgentRunRequest,
        thread: &Thread,
    ) -> Result<AgentRunOutcome> {
        let work_dir = self.work_dir(&request.thread_id);
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("failed to create work directory {}", work_dir.display()))?;

        if let Some(outcome) = reuse_previous_outcome(&work_dir, request.comment_id)? {
            return Ok(outcome);
        }

        write_text_atomic(&work_dir.join(CONTEXT_FILE_NAME), &request.context_document)
            .context("failed to write context document")?;

        if let Err(error) = self.checkout_pr_branch(&request.branch).await {
            let detail = format!("checkout of branch '{}' failed: {error:#}", request.branch);
            write_response_file(&work_dir, &format!("{FAILED_PREFIX} {detail}"))?;
            return Ok(AgentRunOutcome::Failed { detail });
        }

        // Resumed sessions already carry the general rules; only the mode
        // section is re-sent.
        let include_header = thread.session_id.is_none();
        let instructions = render_instructions(
            self.config.template_dir.as_deref(),
            &InstructionContext {
                pr_number: request.pr_number,
                thread_id: request.thread_id.clone(),
                branch: request.branch.clone(),
                mode: request.mode,
                timestamp: utc_now_rfc3339(),
            },
            include_header,
        );
        write_text_atomic(&work_dir.join(INSTRUCTIONS_FILE_NAME), &instructions)
            .context("failed to write instruction document")?;

        let work_request = AgentWorkRequest {
            pr_number: request.pr_number,
            thread_id: &request.thread_id,
            comment_id: request.comment_id,
            mode: request.mode.as_str(),
            branch: &request.branch,
            timestamp: thread.created_at.to_rfc3339(),
        };
        let mut request_payload = serde_json::to_string_pretty(&work_request)
            .context("failed to serialize agent request")?;
        request_payload.push('\n');
        write_text_atomic(&work_dir.join(REQUEST_FILE_NAME), &request_payload)
            .context("failed to write agent request")?;

        let model = self.model_for_mode(request.mode).to_string();

        if let Some(session_id) = thread.session_id.as_deref() {
            let resume_context = render_minimal_context(thread)
                .unwrap_or_else(|| request.context_document.clone());
            let resume_prompt = combine_prompt(&instructions, &resume_context);
            write_text_atomic(&work_dir.join(PROMPT_FILE_NAME), &resume_prompt)
                .context("failed to write combined prompt")?;
            debug!(thread_id = %request.thread_id, session_id, "resuming agent session");
            match self
                .invoker
                .resume(session_id, &AgentPrompt::new(resume_prompt, model.clone()))
                .await
            {
                Ok(response) => {
                    write_response_file(&work_dir, &format!("{SUCCESS_PREFIX} {response}"))?;
                    return Ok(AgentRunOutcome::Succeeded {
                        response,
                        new_session_id: None,
                        reused_previous: false,
                    });
                }
                Err(error) => {
                    warn!(
                        thread_id = %request.thread_id,
                        session_id,
                        "session resume failed, starting a fresh session: {error}"
                    );
                }
            }
        }

        let start_prompt = combine_prompt(&instructions, &request.context_document);
        write_text_atomic(&work_dir.join(PROMPT_FILE_NAME), &start_prompt)
            .context("failed to write combined prompt")?;
        match self
            .invoker
            .start(&AgentPrompt::new(start_prompt, model))
            .await
        {
            Ok(outcome) => {
                write_response_file(&work_dir, &format!("{SUCCESS_PREFIX} {}", outcome.response))?;
                Ok(AgentRunOutcome::Succeeded {
                    response: outcome.response,
                    new_session_id: outcome.session_id,
                    reused_previous: false,
                })
            }
            Err(error) if error.is_unavailable() => {
                write_response_file(&work_dir, PENDING_MANUAL_MARKER)?;
                info!(
                    thread_id = %request.thread_id,
                    "agent unavailable, work files left for manual invocation: {error}"
                );
                Ok(AgentRunOutcome::PendingManual)
            }
            Err(error) => {
                let detail = error.to_string();
                write_response_file(&work_dir, &format!("{FAILED_PREFIX} {detail}"))?;
                Ok(AgentRunOutcome::Failed { detail })
            }
        }
    }

    async fn checkout_pr_branch(&self, branch: &str) -> Result<()> {
        let Some(checkout_dir) = self.config.checkout_dir.as_deref() else {
            return Ok(());
        };
        if branch.trim().is_empty() {
            return Ok(());
        }
        let steps: [&[&str]; 3] = [
            &["fetch", "origin", branch],
            &["checkout", branch],
            &["pull", "origin", branch],
        ];
        for args in steps {
            let output = tokio::process::Command::new("git")
                .args(args)
                .current_dir(checkout_dir)
                .output()
                .await
                .with_context(|| format!("failed to run git {}", args.join(" ")))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!("git {} failed: {}", args.join(" "), stderr.trim());
            }
        }
        Ok(())
    }

    fn model_for_mode(&self, mode: ReviewMode) -> &str {
        let override_model = match mode {
            ReviewMode::Ask => self.config.ask_model.as_deref(),
            ReviewMode::Plan => self.config.plan_model.as_deref(),
            ReviewMode::Implement => self.config.implement_model.as_deref(),
        };
        override_model.unwrap_or(&self.config.default_model)
    }
}

/// Classifies a leftover `agent-response.txt` before invoking the agent.
/// A pending marker keeps the work directory reserved for the human. A
/// recorded outcome is reused only when it belongs to the same comment;
/// anything stale falls through to a fresh invocation.
fn reuse_previous_outcome(work_dir: &Path, comment_id: u64) -> Result<Option<AgentRunOutcome>> {
    let response_path = work_dir.join(RESPONSE_FILE_NAME);
    if !response_path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&response_path)
        .with_context(|| format!("failed to read {}", response_path.display()))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed == PENDING_MANUAL_MARKER {
        return Ok(Some(AgentRunOutcome::PendingManual));
    }

    let recorded_comment = read_recorded_comment_id(work_dir);
    if let Some(response) = trimmed.strip_prefix(SUCCESS_PREFIX) {
        if recorded_comment == Some(comment_id) {
            return Ok(Some(AgentRunOutcome::Succeeded {
                response: response.trim().to_string(),
                new_session_id: None,
                reused_previous: true,
            }));
        }
        return Ok(None);
    }
    if trimmed.starts_with(FAILED_PREFIX) {
        return Ok(None);
    }
    if recorded_comment == Some(comment_id) {
        // Free text for the same comment is a manually authored answer.
        return Ok(Some(AgentRunOutcome::Succeeded {
            response: trimmed.to_string(),
            new_session_id: None,
            reused_previous: true,
        }));
    }
    Ok(None)
}

fn read_recorded_comment_id(work_dir: &Path) -> Option<u64> {
    let raw = std::fs::read_to_string(work_dir.join(REQUEST_FILE_NAME)).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value.get("comment_id")?.as_u64()
}

/// Resume prompts carry only the newest reviewer message; the session
/// already holds the earlier conversation.
fn render_minimal_context(thread: &Thread) -> Option<String> {
    let message = thread.last_user_message()?;
    let mut context = String::new();
    if !message.location.is_empty() {
        context.push_str(&format!("**Location**: `{}`\n\n", message.location));
    }
    context.push_str(&format!(
        "New request from {}:\n\n{}",
        message.author, message.content
    ));
    if !message.code_snippet.is_empty() {
        context.push_str(&format!("\n\n```\n{}\n```", message.code_snippet));
    }
    Some(context)
}

fn combine_prompt(instructions: &str, context: &str) -> String {
    format!("# Instructions\n\n{instructions}\n\n---\n\n# Context\n\n{context}")
}

fn write_response_file(work_dir: &Path, content: &str) -> Result<()> {
    write_text_atomic(&work_dir.join(RESPONSE_FILE_NAME), content)
        .context("failed to write agent response file")
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use otto_agent::StaticAgentInvoker;
    use otto_review::{ReviewMode, Thread, ThreadMessage};

    use super::{
        render_minimal_context, reuse_previous_outcome, AgentRunOutcome, AgentRunRequest,
        AgentSessionConfig, AgentSessionRunner,
    };

    fn runner_with(state_dir: &Path, invoker: Arc<StaticAgentInvoker>) -> AgentSessionRunner {
        AgentSessionRunner::new(
            AgentSessionConfig {
                state_dir: state_dir.to_path_buf(),
                checkout_dir: None,
                template_dir: None,
                default_model: "auto".to_string(),
                ask_model: None,
                plan_model: Some("deep-planner".to_string()),
                implement_model: None,
            },
            invoker,
        )
    }

    fn sample_request(mode: ReviewMode) -> AgentRunRequest {
        AgentRunRequest {
            pr_number: 12,
            thread_id: "pr-12-thread-1700000000".to_string(),
            comment_id: 501,
            mode,
            branch: "feature/streaming".to_string(),
            context_document: "# Agent Context for PR #12\n\nfull conversation context".to_string(),
        }
    }

    fn expect_succeeded(outcome: AgentRunOutcome) -> (String, Option<String>, bool) {
        match outcome {
            AgentRunOutcome::Succeeded {
                response,
                new_session_id,
                reused_previous,
            } => (response, new_session_id, reused_previous),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn unit_model_for_mode_prefers_mode_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = runner_with(dir.path(), Arc::new(StaticAgentInvoker::new("x")));
        assert_eq!(runner.model_for_mode(ReviewMode::Plan), "deep-planner");
        assert_eq!(runner.model_for_mode(ReviewMode::Ask), "auto");
        assert_eq!(runner.model_for_mode(ReviewMode::Implement), "auto");
    }

    #[test]
    fn unit_minimal_context_renders_location_snippet_and_author() {
        let mut thread = Thread::new("pr-12-thread-1700000000", 12);
        let mut message = ThreadMessage::user("alice", "why force unwrap here?");
        message.location = "Sources/App/Recorder.swift:42".to_string();
        message.code_snippet = " 42| let device = devices.first!".to_string();
        thread.messages.push(message);

        let context = render_minimal_context(&thread).expect("context");
        assert!(context.starts_with("**Location**: `Sources/App/Recorder.swift:42`\n\n"));
        assert!(context.contains("New request from alice:\n\nwhy force unwrap here?"));
        assert!(context.ends_with("```\n 42| let device = devices.first!\n```"));
    }

    #[test]
    fn unit_minimal_context_requires_a_user_message() {
        let mut thread = Thread::new("pr-12-thread-1700000000", 12);
        assert!(render_minimal_context(&thread).is_none());
        thread
            .messages
            .push(ThreadMessage::assistant("otto", "earlier answer"));
        assert!(render_minimal_context(&thread).is_none());
    }

    #[tokio::test]
    async fn functional_run_starts_new_session_and_records_work_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("the answer"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let thread = Thread::new("pr-12-thread-1700000000", 12);
        let request = sample_request(ReviewMode::Ask);

        let outcome = runner.run(&request, &thread).await.expect("run");
        let (response, new_session_id, reused_previous) = expect_succeeded(outcome);
        assert_eq!(response, "the answer");
        assert_eq!(new_session_id.as_deref(), Some("stub-session-1"));
        assert!(!reused_previous);

        let work_dir = runner.work_dir(&request.thread_id);
        for name in [
            "context.md",
            "instructions.md",
            "agent-request.json",
            "combined-prompt.md",
            "agent-response.txt",
        ] {
            assert!(work_dir.join(name).exists(), "{name} should exist");
        }
        let response_file =
            std::fs::read_to_string(work_dir.join("agent-response.txt")).expect("response file");
        assert_eq!(response_file, "SUCCESS: the answer");
        let request_json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(work_dir.join("agent-request.json")).expect("request file"),
        )
        .expect("request json");
        assert_eq!(request_json["comment_id"], 501);
        assert_eq!(request_json["mode"], "ask");
        assert_eq!(request_json["branch"], "feature/streaming");

        let calls = invoker.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].session_id, None);
        assert!(calls[0].prompt_text.starts_with("# Instructions"));
        assert!(calls[0].prompt_text.contains("# Context"));
        assert!(calls[0].prompt_text.contains("full conversation context"));
        assert!(calls[0].prompt_text.contains("# Review Agent Instructions"));
    }

    #[tokio::test]
    async fn functional_run_resumes_stored_session_with_minimal_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("resumed answer"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let mut thread = Thread::new("pr-12-thread-1700000000", 12);
        thread.session_id = Some("session-42".to_string());
        thread
            .messages
            .push(ThreadMessage::user("bob", "second question"));

        let outcome = runner
            .run(&sample_request(ReviewMode::Ask), &thread)
            .await
            .expect("run");
        let (response, new_session_id, reused_previous) = expect_succeeded(outcome);
        assert_eq!(response, "resumed answer");
        assert_eq!(new_session_id, None);
        assert!(!reused_previous);

        let calls = invoker.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].session_id.as_deref(), Some("session-42"));
        assert!(calls[0].prompt_text.contains("New request from bob:"));
        assert!(!calls[0].prompt_text.contains("full conversation context"));
        assert!(!calls[0].prompt_text.contains("# Review Agent Instructions"));
    }

    #[tokio::test]
    async fn functional_failed_resume_falls_back_to_fresh_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("recovered").with_resume_failure());
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let mut thread = Thread::new("pr-12-thread-1700000000", 12);
        thread.session_id = Some("session-dead".to_string());
        thread
            .messages
            .push(ThreadMessage::user("bob", "still there?"));
        let request = sample_request(ReviewMode::Ask);

        let outcome = runner.run(&request, &thread).await.expect("run");
        let (response, new_session_id, _) = expect_succeeded(outcome);
        assert_eq!(response, "recovered");
        assert_eq!(new_session_id.as_deref(), Some("stub-session-1"));

        let calls = invoker.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].session_id.as_deref(), Some("session-dead"));
        assert_eq!(calls[1].session_id, None);
        assert!(calls[1].prompt_text.contains("full conversation context"));

        let prompt_file = std::fs::read_to_string(
            runner.work_dir(&request.thread_id).join("combined-prompt.md"),
        )
        .expect("prompt file");
        assert!(prompt_file.contains("full conversation context"));
    }

    #[tokio::test]
    async fn functional_unavailable_agent_leaves_pending_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("unused").with_unavailable());
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let request = sample_request(ReviewMode::Plan);

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        assert!(matches!(outcome, AgentRunOutcome::PendingManual));

        let response_file = std::fs::read_to_string(
            runner.work_dir(&request.thread_id).join("agent-response.txt"),
        )
        .expect("response file");
        assert_eq!(response_file, "PENDING_MANUAL_INVOCATION");
        assert!(runner
            .work_dir(&request.thread_id)
            .join("instructions.md")
            .exists());
    }

    #[tokio::test]
    async fn functional_pending_marker_short_circuits_the_next_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("unused"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let request = sample_request(ReviewMode::Ask);
        let work_dir = runner.work_dir(&request.thread_id);
        std::fs::create_dir_all(&work_dir).expect("work dir");
        std::fs::write(work_dir.join("agent-response.txt"), "PENDING_MANUAL_INVOCATION")
            .expect("marker");

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        assert!(matches!(outcome, AgentRunOutcome::PendingManual));
        assert_eq!(invoker.invocation_count(), 0);
    }

    #[tokio::test]
    async fn functional_manual_response_is_picked_up_for_matching_comment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("unused"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let request = sample_request(ReviewMode::Ask);
        let work_dir = runner.work_dir(&request.thread_id);
        std::fs::create_dir_all(&work_dir).expect("work dir");
        std::fs::write(
            work_dir.join("agent-request.json"),
            r#"{ "comment_id": 501 }"#,
        )
        .expect("request file");
        std::fs::write(
            work_dir.join("agent-response.txt"),
            "Manually written analysis.\n",
        )
        .expect("manual answer");

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        let (response, new_session_id, reused_previous) = expect_succeeded(outcome);
        assert_eq!(response, "Manually written analysis.");
        assert_eq!(new_session_id, None);
        assert!(reused_previous);
        assert_eq!(invoker.invocation_count(), 0);
    }

    #[tokio::test]
    async fn functional_recorded_success_is_reused_for_delivery_retry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("unused"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let request = sample_request(ReviewMode::Ask);
        let work_dir = runner.work_dir(&request.thread_id);
        std::fs::create_dir_all(&work_dir).expect("work dir");
        std::fs::write(
            work_dir.join("agent-request.json"),
            r#"{ "comment_id": 501 }"#,
        )
        .expect("request file");
        std::fs::write(
            work_dir.join("agent-response.txt"),
            "SUCCESS: earlier undelivered reply",
        )
        .expect("success file");

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        let (response, _, reused_previous) = expect_succeeded(outcome);
        assert_eq!(response, "earlier undelivered reply");
        assert!(reused_previous);
        assert_eq!(invoker.invocation_count(), 0);
    }

    #[tokio::test]
    async fn regression_stale_outcome_for_other_comment_triggers_fresh_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("fresh answer"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let request = sample_request(ReviewMode::Ask);
        let work_dir = runner.work_dir(&request.thread_id);
        std::fs::create_dir_all(&work_dir).expect("work dir");
        std::fs::write(
            work_dir.join("agent-request.json"),
            r#"{ "comment_id": 400 }"#,
        )
        .expect("request file");
        std::fs::write(
            work_dir.join("agent-response.txt"),
            "SUCCESS: reply for an older comment",
        )
        .expect("stale success");

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        let (response, _, reused_previous) = expect_succeeded(outcome);
        assert_eq!(response, "fresh answer");
        assert!(!reused_previous);
        assert_eq!(invoker.invocation_count(), 1);
    }

    #[tokio::test]
    async fn regression_failed_record_is_not_mistaken_for_manual_answer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = Arc::new(StaticAgentInvoker::new("fresh answer"));
        let runner = runner_with(dir.path(), Arc::clone(&invoker));
        let request = sample_request(ReviewMode::Ask);
        let work_dir = runner.work_dir(&request.thread_id);
        std::fs::create_dir_all(&work_dir).expect("work dir");
        std::fs::write(
            work_dir.join("agent-request.json"),
            r#"{ "comment_id": 501 }"#,
        )
        .expect("request file");
        std::fs::write(
            work_dir.join("agent-response.txt"),
            "FAILED: agent terminated by signal",
        )
        .expect("failed record");

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        let (response, _, reused_previous) = expect_succeeded(outcome);
        assert_eq!(response, "fresh answer");
        assert!(!reused_previous);
        assert_eq!(invoker.invocation_count(), 1);
    }

    #[tokio::test]
    async fn functional_checkout_failure_fails_the_run_without_invoking() {
        let dir = tempfile::tempdir().expect("tempdir");
        let checkout_dir = tempfile::tempdir().expect("checkout dir");
        let invoker = Arc::new(StaticAgentInvoker::new("unused"));
        let runner = AgentSessionRunner::new(
            AgentSessionConfig {
                state_dir: dir.path().to_path_buf(),
                checkout_dir: Some(checkout_dir.path().to_path_buf()),
                template_dir: None,
                default_model: "auto".to_string(),
                ask_model: None,
                plan_model: None,
                implement_model: None,
            },
            invoker.clone(),
        );
        let request = sample_request(ReviewMode::Implement);

        let outcome = runner
            .run(&request, &Thread::new("pr-12-thread-1700000000", 12))
            .await
            .expect("run");
        match outcome {
            AgentRunOutcome::Failed { detail } => {
                assert!(detail.contains("checkout of branch 'feature/streaming'"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        let response_file = std::fs::read_to_string(
            runner.work_dir(&request.thread_id).join("agent-response.txt"),
        )
        .expect("response file");
        assert!(response_file.starts_with("FAILED:"));
        assert_eq!(invoker.invocation_count(), 0);
    }

    #[test]
    fn unit_reuse_ignores_missing_or_empty_response_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(reuse_previous_outcome(dir.path(), 501)
            .expect("reuse check")
            .is_none());
        std::fs::write(dir.path().join("agent-response.txt"), "  \n").expect("empty file");
        assert!(reuse_previous_outcome(dir.path(), 501)
            .expect("reuse check")
            .is_none());
    }
}
