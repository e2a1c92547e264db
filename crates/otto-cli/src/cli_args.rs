use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "otto",
    about = "Polls pull request review feedback and answers it through a coding agent",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "OTTO_REPO",
        help = "GitHub repository in owner/name format to poll for review feedback"
    )]
    pub repo: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for API access; falls back to `gh auth token` when unset"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "api-base",
        env = "OTTO_API_BASE",
        default_value = "https://api.github.com",
        help = "Base URL for the GitHub REST API"
    )]
    pub api_base: String,

    #[arg(
        long = "state-dir",
        env = "OTTO_STATE_DIR",
        default_value = ".otto/state",
        help = "Directory where thread transcripts and delivery state are persisted"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "OTTO_LABEL",
        default_value = "awaiting-response",
        help = "Only pull requests carrying this label are polled"
    )]
    pub label: String,

    #[arg(
        long = "poll-interval-seconds",
        env = "OTTO_POLL_INTERVAL_SECONDS",
        default_value_t = 60,
        help = "Seconds to sleep between poll cycles"
    )]
    pub poll_interval_seconds: u64,

    #[arg(
        long = "poll-once",
        env = "OTTO_POLL_ONCE",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Run a single poll cycle and exit instead of looping"
    )]
    pub poll_once: bool,

    #[arg(
        long,
        env = "OTTO_PR",
        value_parser = parse_positive_u64,
        help = "Restrict polling to a single pull request number"
    )]
    pub pr: Option<u64>,

    #[arg(
        long = "bot-login",
        env = "OTTO_BOT_LOGIN",
        help = "GitHub login the bridge posts as; comments from this login are never treated as feedback"
    )]
    pub bot_login: Option<String>,

    #[arg(
        long,
        env = "OTTO_MENTION",
        default_value = "bot",
        help = "Mention handle reviewers use to address the agent, e.g. `@bot plan`"
    )]
    pub mention: String,

    #[arg(
        long = "agent-executable",
        env = "OTTO_AGENT_EXECUTABLE",
        default_value = "cursor",
        help = "Coding agent executable invoked for each review request"
    )]
    pub agent_executable: String,

    #[arg(
        long = "agent-extra-args",
        env = "OTTO_AGENT_EXTRA_ARGS",
        help = "Extra arguments appended to every agent invocation, parsed with shell quoting rules"
    )]
    pub agent_extra_args: Option<String>,

    #[arg(
        long = "agent-timeout-seconds",
        env = "OTTO_AGENT_TIMEOUT_SECONDS",
        default_value_t = 600,
        value_parser = parse_positive_u64,
        help = "Seconds to wait for one agent invocation before treating it as failed"
    )]
    pub agent_timeout_seconds: u64,

    #[arg(
        long = "agent-model",
        env = "OTTO_AGENT_MODEL",
        default_value = "auto",
        help = "Default model passed to the agent"
    )]
    pub agent_model: String,

    #[arg(
        long = "agent-model-ask",
        env = "OTTO_AGENT_MODEL_ASK",
        help = "Model override for ask-mode requests"
    )]
    pub agent_model_ask: Option<String>,

    #[arg(
        long = "agent-model-plan",
        env = "OTTO_AGENT_MODEL_PLAN",
        help = "Model override for plan-mode requests"
    )]
    pub agent_model_plan: Option<String>,

    #[arg(
        long = "agent-model-implement",
        env = "OTTO_AGENT_MODEL_IMPLEMENT",
        help = "Model override for implement-mode requests"
    )]
    pub agent_model_implement: Option<String>,

    #[arg(
        long = "stub-agent",
        env = "OTTO_STUB_AGENT",
        default_value_t = false,
        help = "Answer with a canned in-process agent instead of spawning the executable"
    )]
    pub stub_agent: bool,

    #[arg(
        long = "checkout-dir",
        env = "OTTO_CHECKOUT_DIR",
        help = "Local checkout used to extract code windows around inline review comments"
    )]
    pub checkout_dir: Option<PathBuf>,

    #[arg(
        long = "template-dir",
        env = "OTTO_TEMPLATE_DIR",
        help = "Directory of instruction template overrides (instructions-header.md, instructions-<mode>.md)"
    )]
    pub template_dir: Option<PathBuf>,

    #[arg(
        long = "http-timeout-ms",
        env = "OTTO_HTTP_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout in milliseconds for each GitHub API request"
    )]
    pub http_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "OTTO_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Attempts per GitHub API request before the poll cycle reports a failure"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "OTTO_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay in milliseconds for exponential backoff between request retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long,
        env = "OTTO_DEBUG",
        default_value_t = false,
        help = "Lower the default log level from warn to debug"
    )]
    pub debug: bool,
}
