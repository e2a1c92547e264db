use crate::review_command::ReviewMode;

/// Formats the agent's response for posting, framed per mode and ending with
/// a hint naming the next directive available to the reviewer.
pub fn render_agent_reply(mode: ReviewMode, response: &str, mention: &str) -> String {
    match mode {
        ReviewMode::Ask => format!(
            "🤔 **Questions & Clarifications**\n\n{response}\n\n---\n*Reply with answers or use `@{mention} plan` to see an implementation plan*"
        ),
        ReviewMode::Plan => format!(
            "📋 **Implementation Plan**\n\n{response}\n\n---\n*Use `@{mention} implement` to proceed with changes*"
        ),
        ReviewMode::Implement => format!(
            "✅ **Changes Implemented**\n\n{response}\n\n---\n*Changes have been committed and pushed. Ready for review.*"
        ),
    }
}

/// Posted when an invocation fails; names the thread so the work-dir files
/// can be located for manual follow-up.
pub fn render_failure_notice(thread_id: &str) -> String {
    format!("❌ **Processing Failed**\n\nThread: `{thread_id}`\nPlease check the logs for details.")
}
