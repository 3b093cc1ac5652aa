//! Structured logging for graph execution events.

use crate::error::AgentError;

use super::Next;

pub fn log_node_start(node_id: &str, step: usize) {
    tracing::debug!(node_id = node_id, step, "Starting node execution");
}

pub fn log_node_complete(node_id: &str, next: &Next) {
    tracing::debug!(node_id = node_id, ?next, "Node execution complete");
}

pub fn log_state_update(node_id: &str) {
    tracing::trace!(node_id = node_id, "State updated");
}

pub fn log_graph_start() {
    tracing::debug!("Starting graph execution");
}

pub fn log_graph_complete(steps: usize) {
    tracing::debug!(steps, "Graph execution complete");
}

pub fn log_graph_error(error: &AgentError) {
    tracing::error!(?error, "Graph execution error");
}
