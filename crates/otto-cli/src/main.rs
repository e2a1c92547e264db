mod bootstrap_helpers;
mod cli_args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use otto_agent::{AgentInvoker, CliAgentConfig, CliAgentInvoker, StaticAgentInvoker};
use otto_runtime::{run_review_bridge, ReviewBridgeRuntimeConfig};

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;

const STUB_AGENT_REPLY: &str =
    "Stub agent response. Re-run without --stub-agent to invoke the real coding agent.";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let token = resolve_github_token(&cli).await;
    let invoker = build_invoker(&cli)?;

    run_review_bridge(ReviewBridgeRuntimeConfig {
        repo_slug: cli.repo.clone(),
        api_base: cli.api_base.clone(),
        token,
        state_dir: cli.state_dir.clone(),
        required_label: cli.label.trim().to_string(),
        poll_interval: Duration::from_secs(cli.poll_interval_seconds.max(1)),
        poll_once: cli.poll_once,
        only_pr: cli.pr,
        bot_login: cli.bot_login.clone(),
        mention: cli.mention.trim().to_string(),
        invoker,
        checkout_dir: cli.checkout_dir.clone(),
        template_dir: cli.template_dir.clone(),
        default_model: cli.agent_model.clone(),
        ask_model: cli.agent_model_ask.clone(),
        plan_model: cli.agent_model_plan.clone(),
        implement_model: cli.agent_model_implement.clone(),
        http_timeout_ms: cli.http_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })
    .await
}

/// Prefers the flag/env token and falls back to the `gh` CLI. The runtime
/// rejects an empty token with a pointer to both sources.
async fn resolve_github_token(cli: &Cli) -> String {
    if let Some(token) = cli
        .github_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return token.to_string();
    }
    gh_cli_token().await.unwrap_or_default()
}

/// Asks the `gh` CLI for a token; `None` when `gh` is missing or logged out.
async fn gh_cli_token() -> Option<String> {
    let output = tokio::process::Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn build_invoker(cli: &Cli) -> Result<Arc<dyn AgentInvoker>> {
    if cli.stub_agent {
        return Ok(Arc::new(StaticAgentInvoker::new(STUB_AGENT_REPLY)));
    }

    let extra_args = match cli.agent_extra_args.as_deref() {
        Some(raw) => shell_words::split(raw)
            .map_err(|error| anyhow!("invalid --agent-extra-args: {error}"))?,
        None => Vec::new(),
    };
    let invoker = CliAgentInvoker::new(CliAgentConfig {
        executable: cli.agent_executable.clone(),
        extra_args,
        timeout_ms: cli.agent_timeout_seconds.saturating_mul(1_000),
    })
    .context("failed to configure the agent invoker")?;
    Ok(Arc::new(invoker))
}
