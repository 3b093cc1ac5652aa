//! Compiled state graph: immutable, supports invoke only.
//!
//! Built by `StateGraph::compile`. Runs from the first node; after each node,
//! uses the conditional router (if any) or the returned `Next` to pick the next
//! node, until END or `Next::End`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::channels::BoxedStateUpdater;
use crate::error::AgentError;

use super::conditional::NextEntry;
use super::logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
    log_state_update,
};
use super::node::Node;
use super::node_middleware::NodeMiddleware;
use super::retry::RetryPolicy;
use super::state_graph::END;
use super::Next;

/// Compiled graph: immutable structure, supports invoke only.
///
/// Created by `StateGraph::compile()`. Holds nodes, the routing table, optional
/// middleware, the state updater and the retry policy.
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) first_node_id: String,
    pub(super) next_map: HashMap<String, NextEntry<S>>,
    pub(super) middleware: Option<Arc<dyn NodeMiddleware<S>>>,
    pub(super) state_updater: BoxedStateUpdater<S>,
    pub(super) retry_policy: RetryPolicy,
    pub(super) recursion_limit: usize,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    async fn execute_node_with_retry(
        &self,
        node: Arc<dyn Node<S>>,
        state: S,
    ) -> Result<(S, Next), AgentError> {
        let mut attempt = 0;
        loop {
            let current_state = state.clone();
            let result = if let Some(middleware) = &self.middleware {
                let node_id = node.id().to_string();
                let node_clone = node.clone();
                middleware
                    .around_run(
                        &node_id,
                        current_state,
                        Box::new(move |s| {
                            let node = node_clone.clone();
                            Box::pin(async move { node.run(s).await })
                        }),
                    )
                    .await
            } else {
                node.run(current_state).await
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) => {
                    if self.retry_policy.should_retry(attempt) {
                        let delay = self.retry_policy.delay(attempt);
                        tracing::warn!(node_id = node.id(), attempt, error = %e, "retrying node");
                        if delay > std::time::Duration::ZERO {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    fn resolve_next(&self, current_id: &str, state: &S, next: Next) -> Option<String> {
        match self.next_map.get(current_id) {
            Some(NextEntry::Conditional(router)) => {
                let target = router.resolve_next(state);
                tracing::debug!(from = %current_id, to = %target, "conditional routing");
                Some(target)
            }
            entry => match next {
                Next::End => None,
                Next::Node(id) => Some(id),
                Next::Continue => match entry {
                    Some(NextEntry::Unconditional(id)) => Some(id.clone()),
                    _ => None,
                },
            },
        }
    }

    /// Runs the graph with the given state and returns the final state.
    ///
    /// - `Next::Continue`: follow the node's outgoing edge, or end if it has none.
    /// - `Next::Node(id)`: run the node with that id next.
    /// - `Next::End`: stop and return current state.
    ///
    /// Nodes with conditional edges are routed by their router regardless of `Next`.
    pub async fn invoke(&self, state: S) -> Result<S, AgentError> {
        let mut state = state;
        let mut current_id = self.first_node_id.clone();
        let mut steps = 0usize;
        log_graph_start();

        loop {
            if steps >= self.recursion_limit {
                let e = AgentError::RecursionLimit(self.recursion_limit);
                log_graph_error(&e);
                return Err(e);
            }
            let node = match self.nodes.get(&current_id) {
                Some(node) => node.clone(),
                None => {
                    let e = AgentError::ExecutionFailed(format!("unknown node: {}", current_id));
                    log_graph_error(&e);
                    return Err(e);
                }
            };

            log_node_start(&current_id, steps);
            let (new_state, next) = match self.execute_node_with_retry(node, state.clone()).await {
                Ok(output) => output,
                Err(e) => {
                    log_graph_error(&e);
                    return Err(e);
                }
            };
            steps += 1;
            log_node_complete(&current_id, &next);

            self.state_updater.apply_update(&mut state, &new_state);
            log_state_update(&current_id);

            match self.resolve_next(&current_id, &state, next) {
                Some(id) if id != END => current_id = id,
                _ => {
                    log_graph_complete(steps);
                    return Ok(state);
                }
            }
        }
    }
}
