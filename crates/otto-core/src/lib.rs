//! Foundational low-level utilities shared across Otto crates.
//!
//! Provides the atomic file-write helper used by state and thread
//! persistence, plus the small set of time and path helpers the review
//! bridge needs for timestamps and on-disk identifiers.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, sanitize_for_path, utc_now_rfc3339};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_utc_now_rfc3339_parses_back() {
        let raw = utc_now_rfc3339();
        let parsed = chrono::DateTime::parse_from_rfc3339(&raw).expect("parse own output");
        let now_s = current_unix_timestamp();
        let parsed_s = u64::try_from(parsed.timestamp()).expect("non-negative");
        assert!(parsed_s <= now_s.saturating_add(1));
        assert!(parsed_s.saturating_add(60) >= now_s);
    }

    #[test]
    fn unit_sanitize_for_path_replaces_separators() {
        assert_eq!(sanitize_for_path("pr-12/thread:9"), "pr-12_thread_9");
        assert_eq!(sanitize_for_path("plain-name_1.json"), "plain-name_1.json");
    }

    #[test]
    fn functional_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("state.json");
        write_text_atomic(&path, "{\"ok\":true}").expect("write");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "{\"ok\":true}");
    }

    #[test]
    fn functional_write_text_atomic_replaces_existing_file() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("thread.json");
        write_text_atomic(&path, "first").expect("first write");
        write_text_atomic(&path, "second").expect("second write");
        assert_eq!(read_to_string(&path).expect("read"), "second");
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_target() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "text").expect_err("dir target");
        assert!(error.to_string().contains("directory"));
    }
}
