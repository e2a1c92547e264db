//! Runtime for the PR review bridge: polling loop, GitHub API client,
//! durable thread/state stores, reaction guard, and agent orchestration.

pub mod review_bridge_runtime;

pub use review_bridge_runtime::{run_review_bridge, ReviewBridgeRuntimeConfig};
