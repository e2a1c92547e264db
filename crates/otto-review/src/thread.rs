use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One turn in a reconstructed review conversation. Location and code fields
/// stay empty for messages without an inline anchor.
pub struct ThreadMessage {
    pub role: MessageRole,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub code_snippet: String,
    #[serde(default)]
    pub function_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ThreadMessage {
    pub fn user(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, author, content)
    }

    pub fn assistant(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, author, content)
    }

    fn new(role: MessageRole, author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            author: author.into(),
            content: content.into(),
            location: String::new(),
            code_snippet: String::new(),
            function_name: String::new(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A reconstructed conversation: the root comment and its replies, plus the
/// bridge's answers, treated as one context unit for the agent. Threads are
/// append-only and never deleted.
pub struct Thread {
    pub thread_id: String,
    pub pr_number: u64,
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ThreadStatus,
    #[serde(default)]
    pub messages: Vec<ThreadMessage>,
}

impl Thread {
    pub fn new(thread_id: impl Into<String>, pr_number: u64) -> Self {
        Self {
            thread_id: thread_id.into(),
            pr_number,
            session_id: None,
            created_at: Utc::now(),
            status: ThreadStatus::Active,
            messages: Vec::new(),
        }
    }

    /// Latest user turn, used to build the minimal resume context.
    pub fn last_user_message(&self) -> Option<&ThreadMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
    }
}
