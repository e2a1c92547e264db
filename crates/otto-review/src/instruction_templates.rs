use std::path::Path;

use tracing::warn;

use crate::review_command::ReviewMode;

const BUILT_IN_HEADER: &str = "\
# Review Agent Instructions

You are assisting with pull request #{{PR_NUMBER}} on branch `{{BRANCH}}`.
Conversation thread: {{THREAD_ID}} ({{MODE}} mode, generated {{TIMESTAMP}}).

General rules:
- Work only within the checked-out repository.
- Ground every statement in the code and the conversation context below.
- Never amend or force-push existing commits.
";

const BUILT_IN_ASK: &str = "\
## Ask Mode

Answer the reviewer's questions about the code. Do not modify any files.
Point at concrete files and lines where that helps. If the requirements are
unclear, list the clarifying questions you need answered.
";

const BUILT_IN_PLAN: &str = "\
## Plan Mode

Produce a step-by-step implementation plan for the requested change. Do not
modify any files. Name the files you would touch, the order of the steps,
and the tests you would add. Call out risks and alternatives where relevant.
";

const BUILT_IN_IMPLEMENT: &str = "\
## Implement Mode

Implement the requested change on branch `{{BRANCH}}`. Follow the existing
code style, keep the change minimal, and update or add tests. Commit the
result with a clear message and push it, then summarize what changed.
";

#[derive(Debug, Clone)]
/// Values substituted into the instruction templates.
pub struct InstructionContext {
    pub pr_number: u64,
    pub thread_id: String,
    pub branch: String,
    pub mode: ReviewMode,
    pub timestamp: String,
}

/// Renders the instruction document for one invocation. New sessions get the
/// header plus the mode section; resumed sessions get the mode section only.
/// Files named `instructions-header.md` / `instructions-<mode>.md` in
/// `template_dir` override the built-in texts.
pub fn render_instructions(
    template_dir: Option<&Path>,
    context: &InstructionContext,
    include_header: bool,
) -> String {
    let mut parts = Vec::new();
    if include_header {
        parts.push(load_template(template_dir, "instructions-header.md", BUILT_IN_HEADER));
    }
    let (mode_file, built_in) = match context.mode {
        ReviewMode::Ask => ("instructions-ask.md", BUILT_IN_ASK),
        ReviewMode::Plan => ("instructions-plan.md", BUILT_IN_PLAN),
        ReviewMode::Implement => ("instructions-implement.md", BUILT_IN_IMPLEMENT),
    };
    parts.push(load_template(template_dir, mode_file, built_in));

    substitute_placeholders(&parts.join("\n\n"), context)
}

fn load_template(template_dir: Option<&Path>, file_name: &str, built_in: &str) -> String {
    let Some(dir) = template_dir else {
        return built_in.to_string();
    };
    let path = dir.join(file_name);
    match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) => {
            warn!(
                template = file_name,
                path = %path.display(),
                %error,
                "instruction template override missing, using built-in"
            );
            built_in.to_string()
        }
    }
}

fn substitute_placeholders(template: &str, context: &InstructionContext) -> String {
    template
        .replace("{{PR_NUMBER}}", &context.pr_number.to_string())
        .replace("{{THREAD_ID}}", &context.thread_id)
        .replace("{{BRANCH}}", &context.branch)
        .replace("{{MODE}}", context.mode.as_str())
        .replace("{{TIMESTAMP}}", &context.timestamp)
}
