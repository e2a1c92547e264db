//! Per-thread transcript persistence.
//!
//! Each thread lives in its own JSON file under the state directory, named by
//! thread id. The registry in the state store maps comment ids to thread ids;
//! this store owns loading, creating, and appending to the transcripts the
//! registry points at.

use std::path::PathBuf;

use anyhow::{Context, Result};

use otto_core::{current_unix_timestamp, sanitize_for_path, write_text_atomic};
use otto_review::{Thread, ThreadMessage, ThreadStatus};

use super::bridge_state_store::BridgeStateStore;

pub(super) struct ThreadLookup {
    pub(super) thread: Thread,
    /// True when this lookup mapped the comment into the thread for the
    /// first time. Retried deliveries come back false and must not append
    /// the reviewer's message again.
    pub(super) newly_mapped: bool,
}

pub(super) struct ThreadStore {
    state_dir: PathBuf,
}

impl ThreadStore {
    pub(super) fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    pub(super) fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.state_dir
            .join(format!("{}.json", sanitize_for_path(thread_id)))
    }

    /// Resolves the thread a comment belongs to, creating one when neither
    /// the comment nor its root has been seen before. Replies join the root
    /// comment's thread; a reply that arrives before its root reserves the
    /// new thread for both ids.
    pub(super) fn get_or_create_thread(
        &self,
        registry: &mut BridgeStateStore,
        pr_number: u64,
        comment_id: u64,
        root_id: u64,
    ) -> Result<ThreadLookup> {
        if let Some(thread_id) = registry.thread_for_comment(comment_id) {
            let thread = self.load_thread(thread_id)?;
            return Ok(ThreadLookup {
                thread,
                newly_mapped: false,
            });
        }

        if root_id != comment_id {
            if let Some(thread_id) = registry.thread_for_comment(root_id) {
                let thread_id = thread_id.to_string();
                let thread = self.load_thread(&thread_id)?;
                registry.map_comment_to_thread(comment_id, &thread_id);
                return Ok(ThreadLookup {
                    thread,
                    newly_mapped: true,
                });
            }
        }

        let thread_id = self.allocate_thread_id(pr_number, current_unix_timestamp());
        let thread = Thread::new(thread_id.clone(), pr_number);
        self.save_thread(&thread)?;
        registry.register_thread(&thread_id, pr_number, thread.created_at.to_rfc3339());
        registry.map_comment_to_thread(comment_id, &thread_id);
        if root_id != comment_id {
            registry.map_comment_to_thread(root_id, &thread_id);
        }
        Ok(ThreadLookup {
            thread,
            newly_mapped: true,
        })
    }

    pub(super) fn load_thread(&self, thread_id: &str) -> Result<Thread> {
        let path = self.thread_path(thread_id);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read thread file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse thread file {}", path.display()))
    }

    pub(super) fn save_thread(&self, thread: &Thread) -> Result<()> {
        let path = self.thread_path(&thread.thread_id);
        let mut payload =
            serde_json::to_string_pretty(thread).context("failed to serialize thread")?;
        payload.push('\n');
        write_text_atomic(&path, &payload)
            .with_context(|| format!("failed to write thread file {}", path.display()))
    }

    pub(super) fn append_message(&self, thread: &mut Thread, message: ThreadMessage) -> Result<()> {
        thread.messages.push(message);
        self.save_thread(thread)
    }

    pub(super) fn store_session_id(&self, thread: &mut Thread, session_id: &str) -> Result<()> {
        if thread.session_id.as_deref() == Some(session_id) {
            return Ok(());
        }
        thread.session_id = Some(session_id.to_string());
        self.save_thread(thread)
    }

    pub(super) fn set_status(
        &self,
        registry: &mut BridgeStateStore,
        thread: &mut Thread,
        status: ThreadStatus,
    ) -> Result<()> {
        thread.status = status;
        self.save_thread(thread)?;
        registry.set_thread_status(&thread.thread_id, status);
        Ok(())
    }

    fn allocate_thread_id(&self, pr_number: u64, epoch_seconds: u64) -> String {
        let mut stamp = epoch_seconds;
        loop {
            let candidate = format!("pr-{pr_number}-thread-{stamp}");
            if !self.thread_path(&candidate).exists() {
                return candidate;
            }
            stamp = stamp.saturating_add(1);
        }
    }
}
