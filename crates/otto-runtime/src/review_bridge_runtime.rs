//! Review bridge runtime: polls GitHub pull requests that carry the
//! awaiting-response label, dispatches reviewer comments through the agent,
//! and posts the formatted replies back to the PR.
//!
//! The loop is restart-safe by construction. Reactions on the comments are
//! the authoritative processed state; the local state directory only caches
//! thread transcripts and the comment-to-thread index on top of it.

mod agent_session;
mod bridge_state_store;
mod github_api_client;
mod reaction_guard;
mod thread_store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};

use otto_agent::AgentInvoker;
use otto_review::{
    build_context, clean_comment_body, collect_review_comments, extract_code_window,
    linked_issue_reference, parse_location, parse_review_mode, render_agent_reply,
    render_failure_notice, CommentKind, PrMetadata, ReviewComment, ThreadMessage, ThreadStatus,
    CHANGED_FILES_LIMIT, DEFAULT_CONTEXT_LINES,
};

use agent_session::{AgentRunOutcome, AgentRunRequest, AgentSessionConfig, AgentSessionRunner};
use bridge_state_store::BridgeStateStore;
use github_api_client::{CreatedComment, GithubApiClient};
use reaction_guard::{is_settled, CommentRef, ReactionGuard};
use thread_store::{ThreadLookup, ThreadStore};

#[cfg(test)]
mod tests;

const STATE_FILE_NAME: &str = "automation-state.json";
const DEFAULT_ASSISTANT_AUTHOR: &str = "otto-agent";

/// Configuration for one bridge instance. One instance is assumed to be the
/// sole automation writer against the configured repository.
#[derive(Clone)]
pub struct ReviewBridgeRuntimeConfig {
    pub repo_slug: String,
    pub api_base: String,
    pub token: String,
    pub state_dir: PathBuf,
    pub required_label: String,
    pub poll_interval: Duration,
    pub poll_once: bool,
    pub only_pr: Option<u64>,
    pub bot_login: Option<String>,
    pub mention: String,
    pub invoker: Arc<dyn AgentInvoker>,
    pub checkout_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub default_model: String,
    pub ask_model: Option<String>,
    pub plan_model: Option<String>,
    pub implement_model: Option<String>,
    pub http_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RepoRef {
    owner: String,
    name: String,
}

impl RepoRef {
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid --repo '{raw}', expected owner/name"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid --repo '{raw}', expected owner/name");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Default)]
pub(crate) struct PollCycleReport {
    pub(crate) prs_scanned: usize,
    pub(crate) comments_discovered: usize,
    pub(crate) comments_processed: usize,
    pub(crate) comments_skipped_settled: usize,
    pub(crate) comments_skipped_bot: usize,
    pub(crate) comments_skipped_empty: usize,
    pub(crate) replies_posted: usize,
    pub(crate) pending_manual: usize,
    pub(crate) failures: usize,
}

enum CommentDispatchOutcome {
    Replied,
    PendingManual,
    Failed,
}

/// Runs the review bridge until interrupted (or for one cycle with
/// `poll_once`).
pub async fn run_review_bridge(config: ReviewBridgeRuntimeConfig) -> Result<()> {
    let mut runtime = ReviewBridgeRuntime::new(config)?;
    runtime.run().await
}

struct ReviewBridgeRuntime {
    config: ReviewBridgeRuntimeConfig,
    repo: RepoRef,
    github_client: GithubApiClient,
    state_store: BridgeStateStore,
    thread_store: ThreadStore,
    session_runner: AgentSessionRunner,
}

impl ReviewBridgeRuntime {
    fn new(config: ReviewBridgeRuntimeConfig) -> Result<Self> {
        let repo = RepoRef::parse(&config.repo_slug)?;
        if config.token.trim().is_empty() {
            bail!("github token is required; pass --github-token or set GITHUB_TOKEN");
        }
        std::fs::create_dir_all(&config.state_dir)
            .with_context(|| format!("failed to create {}", config.state_dir.display()))?;

        let github_client = GithubApiClient::new(
            config.api_base.clone(),
            config.token.clone(),
            repo.clone(),
            config.http_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;
        let state_store = BridgeStateStore::load(config.state_dir.join(STATE_FILE_NAME))?;
        let thread_store = ThreadStore::new(config.state_dir.clone());
        let session_runner = AgentSessionRunner::new(
            AgentSessionConfig {
                state_dir: config.state_dir.clone(),
                checkout_dir: config.checkout_dir.clone(),
                template_dir: config.template_dir.clone(),
                default_model: config.default_model.clone(),
                ask_model: config.ask_model.clone(),
                plan_model: config.plan_model.clone(),
                implement_model: config.implement_model.clone(),
            },
            Arc::clone(&config.invoker),
        );
        Ok(Self {
            repo,
            github_client,
            state_store,
            thread_store,
            session_runner,
            config,
        })
    }

    async fn run(&mut self) -> Result<()> {
        println!(
            "review bridge starting: repo={} label={} poll_interval_s={} state_dir={}",
            self.repo.as_slug(),
            self.config.required_label,
            self.config.poll_interval.as_secs(),
            self.config.state_dir.display()
        );

        let mut failure_streak = 0_usize;
        loop {
            match self.poll_once().await {
                Ok(report) => {
                    failure_streak = 0;
                    println!(
                        "review bridge poll: repo={} prs={} discovered={} processed={} replied={} pending_manual={} failed={} skipped_settled={} skipped_bot={} skipped_empty={}",
                        self.repo.as_slug(),
                        report.prs_scanned,
                        report.comments_discovered,
                        report.comments_processed,
                        report.replies_posted,
                        report.pending_manual,
                        report.failures,
                        report.comments_skipped_settled,
                        report.comments_skipped_bot,
                        report.comments_skipped_empty
                    );
                    if self.config.poll_once {
                        return Ok(());
                    }
                }
                Err(error) => {
                    failure_streak = failure_streak.saturating_add(1);
                    eprintln!("review bridge poll error (streak {failure_streak}): {error:#}");
                    if self.config.poll_once {
                        return Err(error);
                    }
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("review bridge shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    async fn poll_once(&mut self) -> Result<PollCycleReport> {
        let mut report = PollCycleReport::default();
        let pull_requests = self.github_client.list_open_pull_requests().await?;

        for pull_request in &pull_requests {
            if let Some(only_pr) = self.config.only_pr {
                if pull_request.number != only_pr {
                    continue;
                }
            }
            if !pull_request.has_label(&self.config.required_label) {
                continue;
            }
            report.prs_scanned = report.prs_scanned.saturating_add(1);
            if let Err(error) = self
                .process_pull_request(pull_request.number, &mut report)
                .await
            {
                report.failures = report.failures.saturating_add(1);
                eprintln!(
                    "error processing pr #{}: {error:#}",
                    pull_request.number
                );
            }
        }

        if self.state_store.is_dirty() {
            self.state_store.save()?;
        }
        Ok(report)
    }

    async fn process_pull_request(
        &mut self,
        pr_number: u64,
        report: &mut PollCycleReport,
    ) -> Result<()> {
        let issue_comments = self.github_client.list_issue_comments(pr_number).await?;
        let review_comments = self.github_client.list_review_comments(pr_number).await?;
        let raw_count = issue_comments.len().saturating_add(review_comments.len());
        let collected = collect_review_comments(
            &issue_comments,
            &review_comments,
            self.config.bot_login.as_deref(),
        );
        report.comments_discovered = report.comments_discovered.saturating_add(raw_count);
        report.comments_skipped_bot = report
            .comments_skipped_bot
            .saturating_add(raw_count.saturating_sub(collected.len()));

        let mut dispatchable = Vec::new();
        for comment in collected {
            if is_settled(&comment.reactions) {
                report.comments_skipped_settled = report.comments_skipped_settled.saturating_add(1);
                continue;
            }
            if clean_comment_body(&comment.body).is_empty() {
                report.comments_skipped_empty = report.comments_skipped_empty.saturating_add(1);
                continue;
            }
            dispatchable.push(comment);
        }
        if dispatchable.is_empty() {
            return Ok(());
        }

        let detail = self.github_client.get_pull_request(pr_number).await?;
        let files = self.github_client.list_pull_request_files(pr_number).await?;
        let mut changed_files = files
            .into_iter()
            .map(|file| file.filename)
            .collect::<Vec<_>>();
        changed_files.truncate(CHANGED_FILES_LIMIT);
        let meta = PrMetadata {
            number: detail.number,
            title: detail.title,
            branch: detail.head.ref_name,
            body: detail.body.unwrap_or_default(),
            changed_files,
        };
        let linked_issue = self.fetch_linked_issue(&meta.body).await;

        for comment in &dispatchable {
            match self
                .dispatch_comment(pr_number, comment, &meta, linked_issue.as_ref())
                .await
            {
                Ok(outcome) => {
                    report.comments_processed = report.comments_processed.saturating_add(1);
                    match outcome {
                        CommentDispatchOutcome::Replied => {
                            report.replies_posted = report.replies_posted.saturating_add(1);
                        }
                        CommentDispatchOutcome::PendingManual => {
                            report.pending_manual = report.pending_manual.saturating_add(1);
                        }
                        CommentDispatchOutcome::Failed => {
                            report.failures = report.failures.saturating_add(1);
                        }
                    }
                }
                Err(error) => {
                    report.failures = report.failures.saturating_add(1);
                    eprintln!(
                        "error processing comment {} on pr #{}: {error:#}",
                        comment.id, pr_number
                    );
                }
            }
        }
        Ok(())
    }

    /// Fetches the issue the PR body claims to close; its description takes
    /// priority over the PR description as the requirements source. Fetch
    /// failures degrade to the PR description.
    async fn fetch_linked_issue(&self, pr_body: &str) -> Option<(u64, String)> {
        let issue_number = linked_issue_reference(pr_body)?;
        match self.github_client.get_issue(issue_number).await {
            Ok(issue) => {
                let body = issue.body.unwrap_or_default();
                if body.trim().is_empty() {
                    None
                } else {
                    Some((issue.number, body))
                }
            }
            Err(error) => {
                tracing::warn!(issue_number, "failed to fetch linked issue: {error:#}");
                None
            }
        }
    }

    async fn dispatch_comment(
        &mut self,
        pr_number: u64,
        comment: &ReviewComment,
        meta: &PrMetadata,
        linked_issue: Option<&(u64, String)>,
    ) -> Result<CommentDispatchOutcome> {
        let mode = parse_review_mode(&comment.body);
        let comment_ref = CommentRef {
            id: comment.id,
            kind: comment.kind,
        };
        println!(
            "processing comment {} from {} on pr #{} ({} mode)",
            comment.id,
            comment.author,
            pr_number,
            mode.as_str()
        );

        // Seen is posted before any slow work starts.
        ReactionGuard::new(&self.github_client)
            .mark_seen(comment_ref)
            .await;

        let root_id = comment.in_reply_to.unwrap_or(comment.id);
        let ThreadLookup {
            mut thread,
            newly_mapped,
        } = self.thread_store.get_or_create_thread(
            &mut self.state_store,
            pr_number,
            comment.id,
            root_id,
        )?;

        // Retried deliveries already have the message in the transcript.
        if newly_mapped {
            let message = self.build_user_message(comment);
            self.thread_store.append_message(&mut thread, message)?;
        }

        let context_document = build_context(
            meta,
            linked_issue.map(|(number, body)| (*number, body.as_str())),
            &thread,
        );
        let request = AgentRunRequest {
            pr_number,
            thread_id: thread.thread_id.clone(),
            comment_id: comment.id,
            mode,
            branch: meta.branch.clone(),
            context_document,
        };
        let outcome = self.session_runner.run(&request, &thread).await?;

        match outcome {
            AgentRunOutcome::Succeeded {
                response,
                new_session_id,
                reused_previous,
            } => {
                if let Some(session_id) = new_session_id.as_deref() {
                    self.thread_store.store_session_id(&mut thread, session_id)?;
                }
                if reused_previous {
                    println!(
                        "reusing recorded agent response for comment {} (thread {})",
                        comment.id, thread.thread_id
                    );
                }
                let reply_body = render_agent_reply(mode, &response, &self.config.mention);
                let reply = self
                    .post_for_comment(pr_number, comment, &reply_body)
                    .await
                    .with_context(|| {
                        format!("failed to post reply for comment {}", comment.id)
                    })?;

                // The reply is marked before the original; an unmarked bot
                // reply under a shared login would be scanned as feedback.
                let guard = ReactionGuard::new(&self.github_client);
                guard
                    .mark_done(CommentRef {
                        id: reply.id,
                        kind: comment.kind,
                    })
                    .await;
                guard.mark_done(comment_ref).await;

                let author = self
                    .config
                    .bot_login
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ASSISTANT_AUTHOR.to_string());
                self.thread_store
                    .append_message(&mut thread, ThreadMessage::assistant(author, response))?;
                self.thread_store.set_status(
                    &mut self.state_store,
                    &mut thread,
                    ThreadStatus::Completed,
                )?;
                Ok(CommentDispatchOutcome::Replied)
            }
            AgentRunOutcome::PendingManual => {
                println!(
                    "agent unavailable for comment {} (thread {}), work files await manual invocation",
                    comment.id, thread.thread_id
                );
                Ok(CommentDispatchOutcome::PendingManual)
            }
            AgentRunOutcome::Failed { detail } => {
                eprintln!(
                    "agent failed for comment {} on pr #{} (thread {}): {detail}",
                    comment.id, pr_number, thread.thread_id
                );
                let guard = ReactionGuard::new(&self.github_client);
                guard.mark_failed(comment_ref).await;
                let notice = render_failure_notice(&thread.thread_id);
                match self.post_for_comment(pr_number, comment, &notice).await {
                    Ok(posted) => {
                        guard
                            .mark_failed(CommentRef {
                                id: posted.id,
                                kind: comment.kind,
                            })
                            .await;
                    }
                    Err(error) => {
                        tracing::warn!(
                            comment_id = comment.id,
                            "failed to post failure notice: {error:#}"
                        );
                    }
                }
                self.thread_store.set_status(
                    &mut self.state_store,
                    &mut thread,
                    ThreadStatus::Failed,
                )?;
                Ok(CommentDispatchOutcome::Failed)
            }
        }
    }

    /// Posts a reply on the same channel as the originating comment: inline
    /// comments get a threaded reply, PR-level comments a new PR comment.
    async fn post_for_comment(
        &self,
        pr_number: u64,
        comment: &ReviewComment,
        body: &str,
    ) -> Result<CreatedComment> {
        match comment.kind {
            CommentKind::Review => {
                self.github_client
                    .create_review_comment_reply(pr_number, comment.id, body)
                    .await
            }
            CommentKind::Issue => self.github_client.create_issue_comment(pr_number, body).await,
        }
    }

    fn build_user_message(&self, comment: &ReviewComment) -> ThreadMessage {
        let mut message = ThreadMessage::user(
            comment.author.clone(),
            clean_comment_body(&comment.body),
        );
        if let Some(location) = comment.location.as_deref() {
            message.location = location.to_string();
            if let Some(checkout_dir) = self.config.checkout_dir.as_deref() {
                if let Some((path, line)) = parse_location(location) {
                    if let Some(window) =
                        extract_code_window(checkout_dir, path, line, DEFAULT_CONTEXT_LINES)
                    {
                        message.code_snippet = window.snippet;
                        message.function_name = window.declaration;
                    }
                }
            }
        }
        if let Ok(created_at) = DateTime::parse_from_rfc3339(&comment.created_at) {
            message.timestamp = created_at.with_timezone(&Utc);
        }
        message
    }
}
