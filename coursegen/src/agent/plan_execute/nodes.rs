//! Graph nodes of the plan-execute-replan controller.
//!
//! Every node starts from `state.delta()` and pushes only the records it creates,
//! so the graph's updater keeps the record list append-only.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::prompts::render;
use crate::structured::StructuredLlm;

use super::aggregator::Aggregator;
use super::classifier::StepClassifier;
use super::executor::StepExecutor;
use super::partition::Partition;
use super::runner::ExecutionMode;
use super::schema::{PlanSteps, ReplanDecision};
use super::state::{format_history, Phase, PlanExecuteState};

fn phase_after_plan(mode: ExecutionMode) -> Phase {
    match mode {
        ExecutionMode::Partitioned => Phase::Classifying,
        ExecutionMode::Sequential => Phase::Executing,
    }
}

fn clean_steps(steps: Vec<String>) -> Vec<String> {
    steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Produces the initial plan from the goal. A failed call leaves the plan empty.
pub struct PlanNode {
    llm: StructuredLlm,
    template: String,
    mode: ExecutionMode,
}

impl PlanNode {
    pub fn new(llm: StructuredLlm, template: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            llm,
            template: template.into(),
            mode,
        }
    }
}

#[async_trait]
impl Node<PlanExecuteState> for PlanNode {
    fn id(&self) -> &str {
        "plan"
    }

    async fn run(&self, state: PlanExecuteState) -> Result<(PlanExecuteState, Next), AgentError> {
        let mut out = state.delta();
        let prompt = render(&self.template, &[("goal", state.goal.as_str())]);
        out.plan = match self.llm.invoke::<PlanSteps>(&prompt).await {
            Ok(plan) => clean_steps(plan.steps),
            Err(e) => {
                tracing::warn!(error = %e, "planning failed, continuing with an empty plan");
                Vec::new()
            }
        };
        out.phase = phase_after_plan(self.mode);
        tracing::info!(steps = out.plan.len(), "plan generated");
        Ok((out, Next::Continue))
    }
}

/// Classifies the remaining plan into lanes.
pub struct ClassifyNode {
    classifier: StepClassifier,
}

impl ClassifyNode {
    pub fn new(classifier: StepClassifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Node<PlanExecuteState> for ClassifyNode {
    fn id(&self) -> &str {
        "classify"
    }

    async fn run(&self, state: PlanExecuteState) -> Result<(PlanExecuteState, Next), AgentError> {
        let mut out = state.delta();
        out.partition = self.classifier.classify(&state.plan).await;
        out.phase = Phase::Executing;
        Ok((out, Next::Continue))
    }
}

/// Which list a [`SequentialExecuteNode`] drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Pre,
    Post,
    /// The plan itself (sequential mode).
    Plan,
}

impl Lane {
    fn node_id(self) -> &'static str {
        match self {
            Lane::Pre => "execute_pre",
            Lane::Post => "execute_post",
            Lane::Plan => "execute_step",
        }
    }
}

/// Executes the first step of its lane; the graph loops it until the lane is empty.
pub struct SequentialExecuteNode {
    lane: Lane,
    executor: Arc<StepExecutor>,
}

impl SequentialExecuteNode {
    pub fn new(lane: Lane, executor: Arc<StepExecutor>) -> Self {
        Self { lane, executor }
    }
}

#[async_trait]
impl Node<PlanExecuteState> for SequentialExecuteNode {
    fn id(&self) -> &str {
        self.lane.node_id()
    }

    async fn run(&self, state: PlanExecuteState) -> Result<(PlanExecuteState, Next), AgentError> {
        let mut out = state.delta();
        let lane = match self.lane {
            Lane::Pre => &mut out.partition.pre,
            Lane::Post => &mut out.partition.post,
            Lane::Plan => &mut out.plan,
        };
        if lane.is_empty() {
            return Ok((out, Next::Continue));
        }
        let step = lane.remove(0);
        let record = self.executor.run_one(&step, &state.history()).await;
        tracing::debug!(node_id = self.id(), step = %step, completed = record.is_completed(), "step recorded");
        if self.lane != Lane::Plan {
            out.truncate_step(&step);
        }
        out.records.push(record);
        out.phase = Phase::Executing;
        Ok((out, Next::Continue))
    }
}

/// Executes the whole parallel lane at once and joins before returning.
pub struct ExecuteParallelNode {
    executor: Arc<StepExecutor>,
}

impl ExecuteParallelNode {
    pub fn new(executor: Arc<StepExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Node<PlanExecuteState> for ExecuteParallelNode {
    fn id(&self) -> &str {
        "execute_parallel"
    }

    async fn run(&self, state: PlanExecuteState) -> Result<(PlanExecuteState, Next), AgentError> {
        let mut out = state.delta();
        let steps = std::mem::take(&mut out.partition.parallel);
        let records = self.executor.run_parallel(&steps, &state.history()).await;
        for step in &steps {
            out.truncate_step(step);
        }
        out.records.extend(records);
        out.phase = Phase::Executing;
        Ok((out, Next::Continue))
    }
}

/// Decides whether to stop or continue with more steps.
pub struct ReplanNode {
    llm: StructuredLlm,
    template: String,
    mode: ExecutionMode,
    max_cycles: usize,
}

impl ReplanNode {
    pub fn new(
        llm: StructuredLlm,
        template: impl Into<String>,
        mode: ExecutionMode,
        max_cycles: usize,
    ) -> Self {
        Self {
            llm,
            template: template.into(),
            mode,
            max_cycles,
        }
    }

    fn terminate(out: &mut PlanExecuteState, response: Option<String>) {
        out.response = response;
        out.phase = Phase::Terminal;
        out.partition = Partition::default();
    }
}

/// Remaining plan followed by new steps; completed steps and repeats are skipped.
/// A step whose only records failed may be proposed again.
fn merge_plan(state: &PlanExecuteState, new_steps: Vec<String>) -> Vec<String> {
    let completed: HashSet<&str> = state
        .records
        .iter()
        .filter(|r| r.is_completed())
        .map(|r| r.step.trim())
        .collect();
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for step in state.plan.iter().cloned().chain(clean_steps(new_steps)) {
        if completed.contains(step.trim()) {
            tracing::debug!(step = %step, "dropping step that already completed");
            continue;
        }
        if seen.insert(step.trim().to_string()) {
            merged.push(step);
        }
    }
    merged
}

#[async_trait]
impl Node<PlanExecuteState> for ReplanNode {
    fn id(&self) -> &str {
        "replan"
    }

    async fn run(&self, state: PlanExecuteState) -> Result<(PlanExecuteState, Next), AgentError> {
        let mut out = state.delta();
        if state.cycle >= self.max_cycles {
            tracing::warn!(cycle = state.cycle, max_cycles = self.max_cycles, "replan limit reached, terminating");
            Self::terminate(&mut out, None);
            return Ok((out, Next::Continue));
        }
        out.cycle = state.cycle + 1;
        out.phase = Phase::Replanning;

        let history = format_history(&state.history());
        let remaining = format_history(&state.plan);
        let prompt = render(
            &self.template,
            &[
                ("goal", state.goal.as_str()),
                ("history", history.as_str()),
                ("remaining", remaining.as_str()),
            ],
        );
        let new_steps = match self.llm.invoke::<ReplanDecision>(&prompt).await {
            Ok(ReplanDecision::Respond(text)) if !text.trim().is_empty() => {
                tracing::info!(cycle = out.cycle, "replanner responded, terminating");
                Self::terminate(&mut out, Some(text.trim().to_string()));
                return Ok((out, Next::Continue));
            }
            Ok(ReplanDecision::Respond(_)) => Vec::new(),
            Ok(ReplanDecision::Continue(steps)) => steps,
            Err(e) => {
                tracing::warn!(error = %e, cycle = out.cycle, "replanning failed, keeping remaining plan");
                Vec::new()
            }
        };

        out.plan = merge_plan(&state, new_steps);
        if out.plan.is_empty() {
            tracing::info!(cycle = out.cycle, "nothing left to execute, terminating");
            Self::terminate(&mut out, None);
        } else {
            tracing::info!(cycle = out.cycle, steps = out.plan.len(), "continuing with updated plan");
            out.partition = Partition::default();
            out.phase = match self.mode {
                ExecutionMode::Partitioned => Phase::Classifying,
                ExecutionMode::Sequential => Phase::Executing,
            };
        }
        Ok((out, Next::Continue))
    }
}

/// Writes the final document.
pub struct AggregateNode {
    aggregator: Aggregator,
}

impl AggregateNode {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl Node<PlanExecuteState> for AggregateNode {
    fn id(&self) -> &str {
        "aggregate"
    }

    async fn run(&self, state: PlanExecuteState) -> Result<(PlanExecuteState, Next), AgentError> {
        let mut out = state.delta();
        out.document = Some(self.aggregator.aggregate(&state.records).await);
        out.phase = Phase::Terminal;
        Ok((out, Next::Continue))
    }
}

/// Node runs held back so that a run stopped by the budget can still aggregate.
const RESERVED_RUNS: usize = 3;

/// Whether scheduling more work could push the run past `run_limit` node runs.
pub(super) fn run_budget_spent(state: &PlanExecuteState, run_limit: usize) -> bool {
    let spent = state.node_runs + RESERVED_RUNS >= run_limit;
    if spent {
        tracing::warn!(
            node_runs = state.node_runs,
            run_limit,
            remaining = state.plan.len(),
            "node-run budget reached, aggregating partial results"
        );
    }
    spent
}

/// Smallest run limit that still leaves room for plan, one routing step and aggregate.
pub(super) fn min_run_limit() -> usize {
    RESERVED_RUNS + 1
}

/// Next lane in partitioned mode: pre, then parallel, then post, then replan.
/// An empty plan with no work done, or a spent run budget, goes to aggregation.
pub(super) fn route_lanes(state: &PlanExecuteState, run_limit: usize) -> String {
    let p = &state.partition;
    let target = if state.plan.is_empty() && state.records.is_empty() {
        "aggregate"
    } else if run_budget_spent(state, run_limit) {
        "aggregate"
    } else if !p.pre.is_empty() {
        "execute_pre"
    } else if !p.parallel.is_empty() {
        "execute_parallel"
    } else if !p.post.is_empty() {
        "execute_post"
    } else {
        "replan"
    };
    target.to_string()
}
