use std::sync::OnceLock;

use chrono::SecondsFormat;
use regex::Regex;

use crate::thread::Thread;

/// Changed-file summaries are capped so huge PRs cannot flood the context.
pub const CHANGED_FILES_LIMIT: usize = 20;

#[derive(Debug, Clone)]
/// Pull request facts rendered into the context document header.
pub struct PrMetadata {
    pub number: u64,
    pub title: String,
    pub branch: String,
    pub body: String,
    pub changed_files: Vec<String>,
}

fn closing_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:close[sd]?|fix(?:e[sd])?|resolve[sd]?)\s+#(\d+)")
            .expect("closing reference pattern compiles")
    })
}

/// Finds the first issue a PR body claims to close. That issue's description
/// is the authoritative requirements source when present.
pub fn linked_issue_reference(pr_body: &str) -> Option<u64> {
    let captures = closing_reference_regex().captures(pr_body)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Assembles the full agent context document: PR metadata, the requirements
/// section (linked issue body when available, else the PR description), and
/// the thread's conversation in append order.
pub fn build_context(
    meta: &PrMetadata,
    linked_issue: Option<(u64, &str)>,
    thread: &Thread,
) -> String {
    let mut parts = vec![
        format!("# Agent Context for PR #{}", meta.number),
        String::new(),
        "## 1. PR Metadata".to_string(),
        format!("- **Title**: {}", meta.title),
        format!("- **Branch**: {}", meta.branch),
        format!("- **Files Changed**: {}", meta.changed_files.join(", ")),
        String::new(),
    ];

    match linked_issue {
        Some((issue_number, issue_body)) => {
            parts.push(format!("## 2. Requirements (from linked issue #{issue_number})"));
            parts.push(issue_body.to_string());
        }
        None => {
            parts.push("## 2. PR Description".to_string());
            if meta.body.trim().is_empty() {
                parts.push("_No description provided_".to_string());
            } else {
                parts.push(meta.body.clone());
            }
        }
    }

    parts.push(String::new());
    parts.push("---".to_string());
    parts.push(String::new());
    parts.push("## 3. Review Conversation".to_string());
    parts.push(String::new());

    for message in &thread.messages {
        parts.push(format!(
            "### {} ({}) - {}",
            message.role.as_str().to_uppercase(),
            message.author,
            message.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));

        if !message.location.is_empty() {
            parts.push(format!("**Location**: `{}`", message.location));
            parts.push(String::new());
        }

        if !message.code_snippet.is_empty() {
            parts.push("```".to_string());
            parts.push(message.code_snippet.clone());
            parts.push("```".to_string());
            parts.push(String::new());
        }

        parts.push(message.content.clone());
        parts.push(String::new());
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use crate::thread::{Thread, ThreadMessage};

    use super::{build_context, linked_issue_reference, PrMetadata};

    fn sample_meta() -> PrMetadata {
        PrMetadata {
            number: 17,
            title: "Stream transcription results".to_string(),
            branch: "feature/streaming".to_string(),
            body: "Adds chunked streaming.".to_string(),
            changed_files: vec![
                "Sources/App/Recorder.swift".to_string(),
                "Sources/App/Transcriber.swift".to_string(),
            ],
        }
    }

    #[test]
    fn unit_linked_issue_reference_matches_closing_keywords() {
        assert_eq!(linked_issue_reference("Closes #12"), Some(12));
        assert_eq!(linked_issue_reference("this fixes #9 for good"), Some(9));
        assert_eq!(linked_issue_reference("Resolved #3."), Some(3));
        assert_eq!(linked_issue_reference("see #4 for background"), None);
        assert_eq!(linked_issue_reference("fixture #7"), None);
        assert_eq!(linked_issue_reference(""), None);
    }

    #[test]
    fn functional_build_context_renders_metadata_and_description() {
        let thread = Thread::new("pr-17-thread-1700000000", 17);
        let document = build_context(&sample_meta(), None, &thread);
        assert!(document.starts_with("# Agent Context for PR #17"));
        assert!(document.contains("- **Title**: Stream transcription results"));
        assert!(document.contains("- **Branch**: feature/streaming"));
        assert!(document.contains("Recorder.swift, Sources/App/Transcriber.swift"));
        assert!(document.contains("## 2. PR Description"));
        assert!(document.contains("Adds chunked streaming."));
        assert!(document.contains("## 3. Review Conversation"));
    }

    #[test]
    fn functional_build_context_prefers_linked_issue_requirements() {
        let thread = Thread::new("pr-17-thread-1700000000", 17);
        let document = build_context(&sample_meta(), Some((12, "Must support 2h recordings.")), &thread);
        assert!(document.contains("## 2. Requirements (from linked issue #12)"));
        assert!(document.contains("Must support 2h recordings."));
        assert!(!document.contains("## 2. PR Description"));
    }

    #[test]
    fn functional_build_context_contains_each_message_once_in_order() {
        let mut thread = Thread::new("pr-17-thread-1700000000", 17);
        let contents = ["first question", "first answer", "second question"];
        thread.messages.push(ThreadMessage::user("alice", contents[0]));
        thread.messages.push(ThreadMessage::assistant("otto", contents[1]));
        thread.messages.push(ThreadMessage::user("alice", contents[2]));

        let document = build_context(&sample_meta(), None, &thread);
        let mut last_index = 0;
        for content in contents {
            assert_eq!(document.matches(content).count(), 1, "{content} appears once");
            let index = document.find(content).expect("content present");
            assert!(index > last_index, "{content} keeps append order");
            last_index = index;
        }
    }

    #[test]
    fn functional_build_context_renders_location_and_snippet_blocks() {
        let mut thread = Thread::new("pr-17-thread-1700000000", 17);
        let mut message = ThreadMessage::user("alice", "why force unwrap?");
        message.location = "Sources/App/Recorder.swift:42".to_string();
        message.code_snippet = " 42| ← let device = devices.first!".to_string();
        thread.messages.push(message);

        let document = build_context(&sample_meta(), None, &thread);
        assert!(document.contains("**Location**: `Sources/App/Recorder.swift:42`"));
        assert!(document.contains("```\n 42| ← let device = devices.first!\n```"));
        assert!(document.contains("### USER (alice) -"));
    }

    #[test]
    fn unit_build_context_uses_placeholder_for_missing_description() {
        let mut meta = sample_meta();
        meta.body = "   ".to_string();
        let thread = Thread::new("pr-17-thread-1700000000", 17);
        let document = build_context(&meta, None, &thread);
        assert!(document.contains("_No description provided_"));
    }
}
