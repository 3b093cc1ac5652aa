//! Plan-execute runner: builds the controller graph and runs it.
//!
//! Partitioned: START → plan → classify → [lanes] → execute_pre* → execute_parallel
//! → execute_post* → replan → classify | aggregate → END.
//!
//! Sequential: START → plan → execute_step → replan → execute_step | aggregate → END.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::AgentError;
use crate::graph::{
    CompilationError, CompiledStateGraph, ConditionalRouterFn, LoggingNodeMiddleware, StateGraph,
    DEFAULT_RECURSION_LIMIT, END, START,
};
use crate::llm::LlmClient;
use crate::prompts::Prompts;
use crate::retrieval::{RetrievalMode, Retriever};
use crate::structured::StructuredLlm;

use super::aggregator::Aggregator;
use super::classifier::StepClassifier;
use super::executor::{
    RetrievalAugmentedAgent, StepAgent, StepExecutor, Summarizer, DEFAULT_MAX_CONCURRENCY,
};
use super::nodes::{
    min_run_limit, route_lanes, run_budget_spent, AggregateNode, ClassifyNode,
    ExecuteParallelNode, Lane, PlanNode, ReplanNode, SequentialExecuteNode,
};
use super::state::{ExecutionRecord, PlanExecuteState};

/// Default bound on replanning rounds.
pub const DEFAULT_MAX_CYCLES: usize = 8;

/// Controller variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Lesson planner: classify into pre / parallel / post each cycle.
    #[default]
    Partitioned,
    /// Experiment planner: one step per cycle, replanning after each.
    Sequential,
}

/// Tunables for one runner.
#[derive(Debug, Clone)]
pub struct PlanExecuteConfig {
    pub mode: ExecutionMode,
    pub max_concurrency: usize,
    pub max_cycles: usize,
    /// Deadline for a single step's agent call; `None` waits indefinitely.
    pub step_timeout: Option<Duration>,
    /// Run the writer over the concatenated draft.
    pub polish: bool,
    pub retrieval_mode: RetrievalMode,
    /// Log every node run (enter/exit and elapsed time).
    pub verbose: bool,
    /// Node-run budget per run. Routing stops scheduling steps before it is
    /// reached and aggregates what has been produced so far.
    pub recursion_limit: usize,
}

impl Default for PlanExecuteConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_cycles: DEFAULT_MAX_CYCLES,
            step_timeout: None,
            polish: false,
            retrieval_mode: RetrievalMode::default(),
            verbose: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

/// Model clients per role. Roles may share one client.
#[derive(Clone)]
pub struct PlanExecuteModels {
    /// Planner, classifier and replanner.
    pub planner: Arc<dyn LlmClient>,
    pub executor: Arc<dyn LlmClient>,
    pub summarizer: Arc<dyn LlmClient>,
    pub writer: Arc<dyn LlmClient>,
}

impl PlanExecuteModels {
    pub fn shared(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            planner: llm.clone(),
            executor: llm.clone(),
            summarizer: llm.clone(),
            writer: llm,
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PlanExecuteOutcome {
    pub document: String,
    pub records: Vec<ExecutionRecord>,
    /// Final reply of the replanner, when it ended the run.
    pub response: Option<String>,
    /// Steps left unexecuted when the run ended early (replan limit or final response).
    pub remaining_plan: Vec<String>,
    pub cycles: usize,
}

/// Error type for PlanExecuteRunner operations.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("compilation failed: {0}")]
    Compilation(#[from] CompilationError),
    #[error("execution failed: {0}")]
    Execution(#[from] AgentError),
}

/// Plan-execute-replan runner over a compiled `StateGraph<PlanExecuteState>`.
pub struct PlanExecuteRunner {
    compiled: CompiledStateGraph<PlanExecuteState>,
}

impl PlanExecuteRunner {
    /// Builds the graph with the default retrieval-augmented step agent.
    pub fn new(
        models: PlanExecuteModels,
        retriever: Option<Arc<dyn Retriever>>,
        prompts: &Prompts,
        config: PlanExecuteConfig,
    ) -> Result<Self, CompilationError> {
        let p = &prompts.plan_execute;
        let system = match config.mode {
            ExecutionMode::Partitioned => p.lesson_executor_system(),
            ExecutionMode::Sequential => p.experiment_executor_system(),
        };
        let mut agent =
            RetrievalAugmentedAgent::new(models.executor.clone(), system, p.executor_task());
        if let Some(retriever) = retriever {
            agent = agent.with_retriever(retriever, config.retrieval_mode);
        }
        Self::with_step_agent(models, Arc::new(agent), prompts, config)
    }

    /// Builds the graph around a caller-supplied step agent.
    pub fn with_step_agent(
        models: PlanExecuteModels,
        agent: Arc<dyn StepAgent>,
        prompts: &Prompts,
        config: PlanExecuteConfig,
    ) -> Result<Self, CompilationError> {
        let p = &prompts.plan_execute;
        let structured = StructuredLlm::new(models.planner.clone());
        let planner_template = match config.mode {
            ExecutionMode::Partitioned => p.lesson_planner(),
            ExecutionMode::Sequential => p.experiment_planner(),
        };

        let executor = Arc::new(
            StepExecutor::new(agent, Summarizer::new(models.summarizer.clone(), p.summarizer()))
                .with_max_concurrency(config.max_concurrency)
                .with_step_timeout(config.step_timeout),
        );
        let aggregator = if config.polish {
            Aggregator::with_polish(models.writer.clone(), p.writer())
        } else {
            Aggregator::new()
        };

        let run_limit = config.recursion_limit.max(min_run_limit());
        let mut graph = StateGraph::<PlanExecuteState>::new()
            .with_state_updater(PlanExecuteState::updater())
            .with_recursion_limit(run_limit);

        graph
            .add_node(
                "plan",
                Arc::new(PlanNode::new(structured.clone(), planner_template, config.mode)),
            )
            .add_node(
                "replan",
                Arc::new(ReplanNode::new(
                    structured.clone(),
                    p.replanner(),
                    config.mode,
                    config.max_cycles,
                )),
            )
            .add_node("aggregate", Arc::new(AggregateNode::new(aggregator)))
            .add_edge(START, "plan")
            .add_edge("aggregate", END);

        match config.mode {
            ExecutionMode::Partitioned => {
                let classifier = StepClassifier::new(structured, p.classifier());
                graph
                    .add_node("classify", Arc::new(ClassifyNode::new(classifier)))
                    .add_node(
                        "execute_pre",
                        Arc::new(SequentialExecuteNode::new(Lane::Pre, executor.clone())),
                    )
                    .add_node(
                        "execute_parallel",
                        Arc::new(ExecuteParallelNode::new(executor.clone())),
                    )
                    .add_node(
                        "execute_post",
                        Arc::new(SequentialExecuteNode::new(Lane::Post, executor)),
                    )
                    .add_edge("plan", "classify");

                let lanes: ConditionalRouterFn<PlanExecuteState> =
                    Arc::new(move |s: &PlanExecuteState| route_lanes(s, run_limit));
                for source in ["classify", "execute_pre", "execute_parallel", "execute_post"] {
                    graph.add_conditional_edges(
                        source,
                        lanes.clone(),
                        Some(path_map(&[
                            "execute_pre",
                            "execute_parallel",
                            "execute_post",
                            "replan",
                            "aggregate",
                        ])),
                    );
                }
                graph.add_conditional_edges(
                    "replan",
                    Arc::new(move |s: &PlanExecuteState| after_replan(s, "classify", run_limit)),
                    Some(path_map(&["classify", "aggregate"])),
                );
            }
            ExecutionMode::Sequential => {
                graph
                    .add_node(
                        "execute_step",
                        Arc::new(SequentialExecuteNode::new(Lane::Plan, executor)),
                    )
                    .add_edge("execute_step", "replan")
                    .add_conditional_edges(
                        "plan",
                        Arc::new(move |s: &PlanExecuteState| {
                            let next = if s.plan.is_empty() || run_budget_spent(s, run_limit) {
                                "aggregate"
                            } else {
                                "execute_step"
                            };
                            next.to_string()
                        }),
                        Some(path_map(&["execute_step", "aggregate"])),
                    )
                    .add_conditional_edges(
                        "replan",
                        Arc::new(move |s: &PlanExecuteState| {
                            after_replan(s, "execute_step", run_limit)
                        }),
                        Some(path_map(&["execute_step", "aggregate"])),
                    );
            }
        }

        let graph = if config.verbose {
            graph.with_middleware(Arc::new(LoggingNodeMiddleware::<PlanExecuteState>::default()))
        } else {
            graph
        };

        Ok(Self {
            compiled: graph.compile()?,
        })
    }

    /// Runs the controller for `goal`. Model failures degrade inside the run;
    /// only graph-level errors are returned.
    pub async fn run(&self, goal: &str) -> Result<PlanExecuteOutcome, RunError> {
        tracing::info!(goal_chars = goal.len(), "plan-execute run started");
        let state = self.compiled.invoke(PlanExecuteState::new(goal)).await?;
        let document = match state.document {
            Some(doc) => doc,
            None => Aggregator::new().aggregate(&state.records).await,
        };
        tracing::info!(records = state.records.len(), cycles = state.cycle, "plan-execute run finished");
        Ok(PlanExecuteOutcome {
            document,
            records: state.records,
            response: state.response,
            remaining_plan: state.plan,
            cycles: state.cycle,
        })
    }
}

fn after_replan(state: &PlanExecuteState, next: &str, run_limit: usize) -> String {
    if state.is_terminal() || run_budget_spent(state, run_limit) {
        "aggregate".to_string()
    } else {
        next.to_string()
    }
}

fn path_map(targets: &[&str]) -> HashMap<String, String> {
    targets
        .iter()
        .map(|t| (t.to_string(), t.to_string()))
        .collect()
}
