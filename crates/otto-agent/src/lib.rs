//! Agent invocation layer.
//!
//! The review runtime treats the coding agent as a black box behind the
//! [`AgentInvoker`] trait: hand it a prompt, get text back, optionally with a
//! resumable session handle. [`CliAgentInvoker`] drives a real agent CLI as a
//! subprocess; [`StaticAgentInvoker`] is a deterministic stand-in for tests
//! and dry runs.

pub mod cli_invoker;
pub mod invoker;
pub mod static_invoker;

pub use cli_invoker::{CliAgentConfig, CliAgentInvoker};
pub use invoker::{AgentInvokeError, AgentInvoker, AgentPrompt, AgentStartOutcome};
pub use static_invoker::{RecordedInvocation, StaticAgentInvoker};
