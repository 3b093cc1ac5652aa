//! Minimal state graph runtime: nodes, edges, conditional routing, and a run loop.
//!
//! Every pipeline in this crate is a `StateGraph<S>` compiled once and invoked
//! with an initial state. Nodes receive the full state and return it together with
//! a `Next`; the graph's `StateUpdater` merges the result.

mod compile_error;
mod compiled;
mod conditional;
mod logging;
mod logging_middleware;
mod next;
mod node;
mod node_middleware;
mod retry;
mod state_graph;

pub use compile_error::CompilationError;
pub use compiled::CompiledStateGraph;
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use logging_middleware::LoggingNodeMiddleware;
pub use next::Next;
pub use node::Node;
pub use node_middleware::{NodeMiddleware, NodeRunFn};
pub use retry::RetryPolicy;
pub use state_graph::{StateGraph, DEFAULT_RECURSION_LIMIT, END, START};
