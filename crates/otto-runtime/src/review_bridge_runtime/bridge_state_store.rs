//! State-file persistence for the comment-to-thread registry.
//!
//! The registry is the dispatch ledger shared across poll cycles: which
//! comment ids already belong to a thread, and the lifecycle status of each
//! thread. Thread transcripts themselves live in per-thread files managed by
//! the thread store.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use otto_core::write_text_atomic;
use otto_review::ThreadStatus;

pub(super) const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewBridgeState {
    schema_version: u32,
    #[serde(default)]
    comment_to_thread: BTreeMap<String, String>,
    #[serde(default)]
    threads: BTreeMap<String, ThreadRegistryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct ThreadRegistryEntry {
    pub(super) pr_number: u64,
    pub(super) created_at: String,
    #[serde(default)]
    pub(super) status: ThreadStatus,
}

impl Default for ReviewBridgeState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            comment_to_thread: BTreeMap::new(),
            threads: BTreeMap::new(),
        }
    }
}

pub(super) struct BridgeStateStore {
    path: PathBuf,
    state: ReviewBridgeState,
    dirty: bool,
}

impl BridgeStateStore {
    /// Loads the persisted registry; a missing, unparsable, or
    /// wrong-schema file starts fresh rather than aborting the daemon.
    pub(super) fn load(path: PathBuf) -> Result<Self> {
        let mut state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read state file {}", path.display()))?;
            match serde_json::from_str::<ReviewBridgeState>(&raw) {
                Ok(state) => state,
                Err(error) => {
                    eprintln!(
                        "failed to parse review bridge state file {}: {} (starting fresh)",
                        path.display(),
                        error
                    );
                    ReviewBridgeState::default()
                }
            }
        } else {
            ReviewBridgeState::default()
        };

        if state.schema_version != STATE_SCHEMA_VERSION {
            eprintln!(
                "unsupported review bridge state schema: expected {}, found {} (starting fresh)",
                STATE_SCHEMA_VERSION, state.schema_version
            );
            state = ReviewBridgeState::default();
        }

        Ok(Self {
            path,
            state,
            dirty: false,
        })
    }

    pub(super) fn thread_for_comment(&self, comment_id: u64) -> Option<&str> {
        self.state
            .comment_to_thread
            .get(&comment_id.to_string())
            .map(String::as_str)
    }

    pub(super) fn map_comment_to_thread(&mut self, comment_id: u64, thread_id: &str) -> bool {
        let key = comment_id.to_string();
        if self.state.comment_to_thread.get(&key).map(String::as_str) == Some(thread_id) {
            return false;
        }
        self.state.comment_to_thread.insert(key, thread_id.to_string());
        self.dirty = true;
        true
    }

    pub(super) fn register_thread(
        &mut self,
        thread_id: &str,
        pr_number: u64,
        created_at: String,
    ) -> bool {
        if self.state.threads.contains_key(thread_id) {
            return false;
        }
        self.state.threads.insert(
            thread_id.to_string(),
            ThreadRegistryEntry {
                pr_number,
                created_at,
                status: ThreadStatus::Active,
            },
        );
        self.dirty = true;
        true
    }

    pub(super) fn set_thread_status(&mut self, thread_id: &str, status: ThreadStatus) -> bool {
        match self.state.threads.get_mut(thread_id) {
            Some(entry) if entry.status != status => {
                entry.status = status;
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(super) fn thread_entry(&self, thread_id: &str) -> Option<&ThreadRegistryEntry> {
        self.state.threads.get(thread_id)
    }

    pub(super) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(super) fn save(&mut self) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(&self.state).context("failed to serialize state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write state file {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use otto_review::ThreadStatus;

    use super::{BridgeStateStore, STATE_SCHEMA_VERSION};

    #[test]
    fn unit_load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            BridgeStateStore::load(dir.path().join("automation-state.json")).expect("load");
        assert_eq!(store.thread_for_comment(42), None);
        assert!(!store.is_dirty());
    }

    #[test]
    fn functional_registry_round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("automation-state.json");

        let mut store = BridgeStateStore::load(path.clone()).expect("load");
        assert!(store.register_thread("pr-7-thread-1700000000", 7, "2026-01-05T10:00:00Z".to_string()));
        assert!(store.map_comment_to_thread(501, "pr-7-thread-1700000000"));
        assert!(store.is_dirty());
        store.save().expect("save");
        assert!(!store.is_dirty());

        let reloaded = BridgeStateStore::load(path).expect("reload");
        assert_eq!(
            reloaded.thread_for_comment(501),
            Some("pr-7-thread-1700000000")
        );
        let entry = reloaded
            .thread_entry("pr-7-thread-1700000000")
            .expect("registry entry");
        assert_eq!(entry.pr_number, 7);
        assert_eq!(entry.status, ThreadStatus::Active);
    }

    #[test]
    fn unit_repeat_mappings_do_not_mark_dirty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store =
            BridgeStateStore::load(dir.path().join("automation-state.json")).expect("load");
        store.register_thread("pr-3-thread-1700000001", 3, "2026-01-05T10:00:00Z".to_string());
        store.map_comment_to_thread(88, "pr-3-thread-1700000001");
        store.save().expect("save");

        assert!(!store.map_comment_to_thread(88, "pr-3-thread-1700000001"));
        assert!(!store.register_thread("pr-3-thread-1700000001", 3, "later".to_string()));
        assert!(!store.is_dirty());
    }

    #[test]
    fn unit_set_thread_status_tracks_changes_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store =
            BridgeStateStore::load(dir.path().join("automation-state.json")).expect("load");
        store.register_thread("pr-1-thread-1700000002", 1, "2026-01-05T10:00:00Z".to_string());
        store.save().expect("save");

        assert!(store.set_thread_status("pr-1-thread-1700000002", ThreadStatus::Completed));
        assert!(store.is_dirty());
        store.save().expect("save");
        assert!(!store.set_thread_status("pr-1-thread-1700000002", ThreadStatus::Completed));
        assert!(!store.set_thread_status("pr-unknown", ThreadStatus::Failed));
        assert!(!store.is_dirty());
    }

    #[test]
    fn regression_corrupt_state_file_starts_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("automation-state.json");
        std::fs::write(&path, "{ not json").expect("write corrupt file");

        let store = BridgeStateStore::load(path).expect("load");
        assert_eq!(store.thread_for_comment(1), None);
    }

    #[test]
    fn regression_schema_mismatch_starts_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("automation-state.json");
        let payload = serde_json::json!({
            "schema_version": STATE_SCHEMA_VERSION + 1,
            "comment_to_thread": { "9": "pr-9-thread-1700000003" },
            "threads": {}
        });
        std::fs::write(&path, payload.to_string()).expect("write future schema");

        let store = BridgeStateStore::load(path).expect("load");
        assert_eq!(store.thread_for_comment(9), None);
    }
}
