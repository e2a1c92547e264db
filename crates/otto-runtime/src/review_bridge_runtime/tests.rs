//! Poll-cycle tests for the review bridge: comment dispatch, guard
//! reactions, session resumption, and crash-window recovery against a mock
//! GitHub API.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;
use tempfile::tempdir;

use otto_agent::{
    AgentInvokeError, AgentInvoker, AgentPrompt, AgentStartOutcome, StaticAgentInvoker,
};

use super::{RepoRef, ReviewBridgeRuntime, ReviewBridgeRuntimeConfig};

struct FailingInvoker;

#[async_trait]
impl AgentInvoker for FailingInvoker {
    async fn resume(
        &self,
        _session_id: &str,
        _prompt: &AgentPrompt,
    ) -> Result<String, AgentInvokeError> {
        Err(AgentInvokeError::Process {
            status: "1".to_string(),
            detail: "agent crashed".to_string(),
        })
    }

    async fn start(&self, _prompt: &AgentPrompt) -> Result<AgentStartOutcome, AgentInvokeError> {
        Err(AgentInvokeError::Process {
            status: "1".to_string(),
            detail: "agent crashed".to_string(),
        })
    }
}

fn test_runtime_config(
    base_url: &str,
    state_dir: &Path,
    invoker: Arc<dyn AgentInvoker>,
) -> ReviewBridgeRuntimeConfig {
    ReviewBridgeRuntimeConfig {
        repo_slug: "owner/repo".to_string(),
        api_base: base_url.to_string(),
        token: "test-token".to_string(),
        state_dir: state_dir.to_path_buf(),
        required_label: "awaiting-response".to_string(),
        poll_interval: Duration::from_millis(1),
        poll_once: true,
        only_pr: None,
        bot_login: Some("otto".to_string()),
        mention: "otto".to_string(),
        invoker,
        checkout_dir: None,
        template_dir: None,
        default_model: "auto".to_string(),
        ask_model: None,
        plan_model: None,
        implement_model: None,
        http_timeout_ms: 3_000,
        retry_max_attempts: 2,
        retry_base_delay_ms: 5,
    }
}

fn mount_pull_listing(server: &MockServer, pr_number: u64) {
    server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls");
        then.status(200).json_body(json!([{
            "number": pr_number,
            "title": "Add streaming decoder",
            "labels": [{"name": "awaiting-response"}]
        }]));
    });
}

fn mount_pull_scaffolding(server: &MockServer, pr_number: u64, pr_body: &str) {
    mount_pull_listing(server, pr_number);
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/repos/owner/repo/pulls/{pr_number}"));
        then.status(200).json_body(json!({
            "number": pr_number,
            "title": "Add streaming decoder",
            "body": pr_body,
            "head": {"ref": "feature/streaming"}
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/repos/owner/repo/pulls/{pr_number}/files"));
        then.status(200).json_body(json!([
            {"filename": "src/decoder.rs"},
            {"filename": "src/lib.rs"}
        ]));
    });
}

fn read_state_registry(state_dir: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(state_dir.join("automation-state.json"))
        .expect("read state file");
    serde_json::from_str(&raw).expect("parse state file")
}

fn find_agent_work_dir(state_dir: &Path) -> PathBuf {
    for entry in std::fs::read_dir(state_dir).expect("read state dir") {
        let entry = entry.expect("dir entry");
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(".agent-work-")
        {
            return entry.path();
        }
    }
    panic!("no agent work directory found");
}
