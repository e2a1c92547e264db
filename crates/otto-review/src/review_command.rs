use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Intent extracted from a reviewer comment. `Ask` is the default; an
/// explicit directive addressed to any mention overrides it, with `plan`
/// taking priority over `implement`/`fix`.
pub enum ReviewMode {
    Ask,
    Plan,
    Implement,
}

impl ReviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Plan => "plan",
            Self::Implement => "implement",
        }
    }
}

fn plan_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)@\w+\s+plan").expect("plan directive pattern compiles"))
}

fn implement_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)@\w+\s+(fix|implement)").expect("implement directive pattern compiles")
    })
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\w+\s+").expect("mention pattern compiles"))
}

fn markup_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"</?details>|</?summary>").expect("markup tag pattern compiles")
    })
}

/// Extracts the command mode from a raw comment body.
pub fn parse_review_mode(body: &str) -> ReviewMode {
    if plan_directive_regex().is_match(body) {
        ReviewMode::Plan
    } else if implement_directive_regex().is_match(body) {
        ReviewMode::Implement
    } else {
        ReviewMode::Ask
    }
}

/// Strips platform markup from a comment body before it becomes thread
/// content: collapsible-section tags become newlines, suggestion fences
/// become plain code fences, and the first mention token is dropped.
pub fn clean_comment_body(body: &str) -> String {
    let without_tags = markup_tag_regex().replace_all(body, "\n");
    let without_suggestion = without_tags.replace("```suggestion", "```");
    let without_mention = mention_regex().replace(&without_suggestion, "");
    without_mention.trim().to_string()
}
