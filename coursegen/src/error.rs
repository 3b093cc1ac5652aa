//! Agent execution error types.
//!
//! Used by `Node::run`, `LlmClient::invoke` and the compiled graph run loop.
//! Model and retrieval failures inside the pipelines are degraded locally and
//! rarely reach this type; see `structured::InvokeError` for the boundary taxonomy.

use thiserror::Error;

/// Agent execution error.
///
/// Returned by `Node::run` when a step fails, and by `CompiledStateGraph::invoke`
/// when the run loop cannot continue.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Execution failed with a message (e.g. LLM call failed, HTTP error).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The run loop executed more node steps than the graph's recursion limit allows.
    #[error("recursion limit of {0} node runs reached")]
    RecursionLimit(usize),

    /// An external call did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
