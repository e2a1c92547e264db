//! Reaction-based idempotency guard.
//!
//! Processing state is encoded in emoji reactions on the comment itself:
//! "eyes" marks a comment as seen at dispatch, "rocket" marks it done, "-1"
//! marks it failed. A comment with eyes plus a terminal mark is settled and
//! never dispatched again; eyes alone means processing was interrupted and
//! the comment is retried on the next cycle.

use otto_review::{CommentKind, ReactionRollup};

use super::github_api_client::GithubApiClient;

pub(super) const SEEN_REACTION: &str = "eyes";
pub(super) const DONE_REACTION: &str = "rocket";
pub(super) const FAILED_REACTION: &str = "-1";

/// Seen and done: the comment was fully processed and replied to.
pub(super) fn is_processed(reactions: &ReactionRollup) -> bool {
    reactions.eyes > 0 && reactions.rocket > 0
}

/// Seen plus any terminal mark. Settled comments are skipped by the poll
/// loop; eyes-only comments are retried.
pub(super) fn is_settled(reactions: &ReactionRollup) -> bool {
    is_processed(reactions) || (reactions.eyes > 0 && reactions.minus_one > 0)
}

#[derive(Debug, Clone, Copy)]
pub(super) struct CommentRef {
    pub(super) id: u64,
    pub(super) kind: CommentKind,
}

/// Applies guard reactions. Every call is best-effort: a failed reaction
/// POST is logged and otherwise ignored. A missing mark costs at most one
/// redundant dispatch.
pub(super) struct ReactionGuard<'a> {
    client: &'a GithubApiClient,
}

impl<'a> ReactionGuard<'a> {
    pub(super) fn new(client: &'a GithubApiClient) -> Self {
        Self { client }
    }

    pub(super) async fn mark_seen(&self, comment: CommentRef) {
        self.add(comment, SEEN_REACTION).await;
    }

    /// Installs the full processed pair. The seen mark is re-posted first in
    /// case the dispatch-time mark never landed; GitHub treats a duplicate
    /// reaction as a no-op.
    pub(super) async fn mark_done(&self, comment: CommentRef) {
        self.add(comment, SEEN_REACTION).await;
        self.add(comment, DONE_REACTION).await;
    }

    pub(super) async fn mark_failed(&self, comment: CommentRef) {
        self.add(comment, SEEN_REACTION).await;
        self.add(comment, FAILED_REACTION).await;
    }

    async fn add(&self, comment: CommentRef, content: &str) {
        let result = match comment.kind {
            CommentKind::Issue => {
                self.client
                    .add_issue_comment_reaction(comment.id, content)
                    .await
            }
            CommentKind::Review => {
                self.client
                    .add_review_comment_reaction(comment.id, content)
                    .await
            }
        };
        if let Err(error) = result {
            tracing::warn!(
                comment_id = comment.id,
                kind = comment.kind.as_str(),
                reaction = content,
                "failed to add guard reaction: {error:#}"
            );
        }
    }
}
