use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
/// GitHub user as it appears on comment and PR payloads.
pub struct GithubUser {
    pub login: String,
    #[serde(default, rename = "type")]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Reaction rollup embedded in comment list payloads. Only the contents the
/// guard reads are modeled; unknown reaction kinds are ignored.
pub struct ReactionRollup {
    #[serde(default)]
    pub eyes: u64,
    #[serde(default)]
    pub rocket: u64,
    #[serde(default, rename = "-1")]
    pub minus_one: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// PR-level (issue) comment payload.
pub struct GithubIssueComment {
    pub id: u64,
    pub body: Option<String>,
    pub created_at: String,
    pub user: GithubUser,
    #[serde(default)]
    pub reactions: ReactionRollup,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Inline review comment payload.
pub struct GithubReviewComment {
    pub id: u64,
    pub body: Option<String>,
    pub path: String,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub original_line: Option<u64>,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    pub created_at: String,
    pub user: GithubUser,
    #[serde(default)]
    pub reactions: ReactionRollup,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Label entry on a pull request payload.
pub struct GithubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Pull request entry from the open-PR listing.
pub struct GithubPullRequestSummary {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<GithubLabel>,
}

impl GithubPullRequestSummary {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|entry| entry.name == label)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Branch pointer on a pull request payload.
pub struct GithubBranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Detailed pull request payload.
pub struct GithubPullRequestDetail {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub head: GithubBranchRef,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Changed-file entry from the PR files listing.
pub struct GithubPullRequestFile {
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Issue payload, fetched when a PR body references a requirements issue.
pub struct GithubIssueDetail {
    pub number: u64,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Distinguishes the two comment channels a PR carries; reactions and
/// replies use different endpoints per kind.
pub enum CommentKind {
    Issue,
    Review,
}

impl CommentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Review => "review",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A reviewer comment normalized from either channel, the unit the
/// monitoring loop dispatches.
pub struct ReviewComment {
    pub id: u64,
    pub kind: CommentKind,
    pub author: String,
    pub body: String,
    pub location: Option<String>,
    pub in_reply_to: Option<u64>,
    pub created_at: String,
    pub reactions: ReactionRollup,
}

/// Merges a PR's issue comments and inline review comments into one
/// chronological stream, dropping bot-authored and blank entries. Replies to
/// inline comments are kept; the thread manager folds them into the root
/// comment's thread.
pub fn collect_review_comments(
    issue_comments: &[GithubIssueComment],
    review_comments: &[GithubReviewComment],
    bot_login: Option<&str>,
) -> Vec<ReviewComment> {
    let mut collected = Vec::new();

    for comment in issue_comments {
        if is_bot_author(&comment.user, bot_login) {
            continue;
        }
        let body = comment.body.clone().unwrap_or_default();
        if body.trim().is_empty() {
            continue;
        }
        collected.push(ReviewComment {
            id: comment.id,
            kind: CommentKind::Issue,
            author: comment.user.login.clone(),
            body,
            location: None,
            in_reply_to: None,
            created_at: comment.created_at.clone(),
            reactions: comment.reactions.clone(),
        });
    }

    for comment in review_comments {
        if is_bot_author(&comment.user, bot_login) {
            continue;
        }
        let body = comment.body.clone().unwrap_or_default();
        if body.trim().is_empty() {
            continue;
        }
        let location = comment
            .line
            .or(comment.original_line)
            .map(|line| format!("{}:{line}", comment.path));
        collected.push(ReviewComment {
            id: comment.id,
            kind: CommentKind::Review,
            author: comment.user.login.clone(),
            body,
            location,
            in_reply_to: comment.in_reply_to_id,
            created_at: comment.created_at.clone(),
            reactions: comment.reactions.clone(),
        });
    }

    collected.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then(left.id.cmp(&right.id))
    });
    collected
}

fn is_bot_author(user: &GithubUser, bot_login: Option<&str>) -> bool {
    if user.user_type.as_deref() == Some("Bot") {
        return true;
    }
    matches!(bot_login, Some(login) if user.login == login)
}
