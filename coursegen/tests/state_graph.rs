//! Integration tests: graph runtime with conditional loops, state merging and middleware.


use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coursegen::graph::NodeRunFn;
use coursegen::{
    AgentError, FieldBasedUpdater, Next, Node, NodeMiddleware, StateGraph, END, START,
};

#[derive(Clone, Debug, Default)]
struct Drain {
    queue: Vec<u32>,
    done: Vec<u32>,
}

/// Pops one item per run; emits only the item it processed in `done`.
struct PopOne;

#[async_trait]
impl Node<Drain> for PopOne {
    fn id(&self) -> &str {
        "pop"
    }

    async fn run(&self, state: Drain) -> Result<(Drain, Next), AgentError> {
        let mut queue = state.queue.clone();
        let done = if queue.is_empty() { vec![] } else { vec![queue.remove(0)] };
        Ok((Drain { queue, done }, Next::Continue))
    }
}

struct Counting(Arc<AtomicUsize>);

#[async_trait]
impl NodeMiddleware<Drain> for Counting {
    async fn around_run(
        &self,
        _node_id: &str,
        state: Drain,
        inner: NodeRunFn<Drain>,
    ) -> Result<(Drain, Next), AgentError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        inner(state).await
    }
}

fn drain_graph(count: Arc<AtomicUsize>, limit: usize) -> coursegen::CompiledStateGraph<Drain> {
    let updater = FieldBasedUpdater::new(|current: &mut Drain, update: &Drain| {
        current.queue = update.queue.clone();
        current.done.extend(update.done.iter().copied());
    });
    let mut graph = StateGraph::<Drain>::new()
        .with_state_updater(Arc::new(updater))
        .with_recursion_limit(limit);
    let path_map: HashMap<String, String> = [
        ("pop".to_string(), "pop".to_string()),
        (END.to_string(), END.to_string()),
    ]
    .into_iter()
    .collect();
    graph
        .add_node("pop", Arc::new(PopOne))
        .add_edge(START, "pop")
        .add_conditional_edges(
            "pop",
            Arc::new(|s: &Drain| {
                if s.queue.is_empty() { END.to_string() } else { "pop".to_string() }
            }),
            Some(path_map),
        );
    graph
        .with_middleware(Arc::new(Counting(count)))
        .compile()
        .unwrap()
}

/// **Scenario**: A self-loop drains the queue one item per run, in order, and the
/// middleware sees every run.
#[tokio::test]
async fn conditional_self_loop_drains_in_order() {
    let count = Arc::new(AtomicUsize::new(0));
    let compiled = drain_graph(count.clone(), 100);
    let out = compiled
        .invoke(Drain {
            queue: vec![3, 1, 2],
            done: vec![],
        })
        .await
        .unwrap();
    assert_eq!(out.done, vec![3, 1, 2]);
    assert!(out.queue.is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn loop_longer_than_recursion_limit_fails() {
    let compiled = drain_graph(Arc::new(AtomicUsize::new(0)), 2);
    let err = compiled
        .invoke(Drain {
            queue: vec![1, 2, 3, 4],
            done: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::RecursionLimit(2)));
}
