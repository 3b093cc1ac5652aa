//! Plan-execute-replan workflow with dependency-aware scheduling.
//!
//! The planner decomposes a goal into ordered steps, the classifier splits them
//! into pre / parallel / post lanes, the executor runs the lanes (parallel steps
//! with bounded concurrency), the replanner decides whether to stop or add
//! steps, and the aggregator composes the final document.
//!
//! Entry point: [`PlanExecuteRunner`].

mod aggregator;
mod classifier;
mod executor;
mod nodes;
mod partition;
mod runner;
mod schema;
mod state;

pub use aggregator::{
    concatenate, polish_with_fallback, Aggregator, FAILED_GRACEFULLY, FALLBACK_HEADING,
};
pub use classifier::StepClassifier;
pub use executor::{
    fallback_summary, RetrievalAugmentedAgent, StepAgent, StepExecutor, Summarizer,
    DEFAULT_MAX_CONCURRENCY,
};
pub use nodes::{
    AggregateNode, ClassifyNode, ExecuteParallelNode, Lane, PlanNode, ReplanNode,
    SequentialExecuteNode,
};
pub use partition::{check_partition, reconcile, Partition, PartitionCheck};
pub use runner::{
    ExecutionMode, PlanExecuteConfig, PlanExecuteModels, PlanExecuteOutcome, PlanExecuteRunner,
    RunError, DEFAULT_MAX_CYCLES,
};
pub use schema::{PlanSteps, ReplanDecision};
pub use state::{ExecutionRecord, Phase, PlanExecuteState, RecordStatus};
