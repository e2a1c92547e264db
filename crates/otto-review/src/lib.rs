//! Shared domain types and helpers for the Otto PR review bridge.
//! This crate provides comment collection, command parsing, code-window
//! extraction, context-document assembly, and the reply/instruction
//! templates consumed by the runtime crate.

pub mod code_window;
pub mod comment_collection;
pub mod context_document;
pub mod instruction_templates;
pub mod reply_templates;
pub mod review_command;
pub mod thread;

pub use code_window::{extract_code_window, parse_location, CodeWindow, DEFAULT_CONTEXT_LINES};
pub use comment_collection::{
    collect_review_comments, CommentKind, GithubBranchRef, GithubIssueComment, GithubIssueDetail,
    GithubLabel, GithubPullRequestDetail, GithubPullRequestFile, GithubPullRequestSummary,
    GithubReviewComment, GithubUser, ReactionRollup, ReviewComment,
};
pub use context_document::{build_context, linked_issue_reference, PrMetadata, CHANGED_FILES_LIMIT};
pub use instruction_templates::{render_instructions, InstructionContext};
pub use reply_templates::{render_agent_reply, render_failure_notice};
pub use review_command::{clean_comment_body, parse_review_mode, ReviewMode};
pub use thread::{MessageRole, Thread, ThreadMessage, ThreadStatus};
