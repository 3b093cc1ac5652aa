//! Plan-execute state: plan, partition, execution records and the terminal response.
//!
//! Nodes return a *delta* (see [`PlanExecuteState::delta`]): `records` holds only
//! the records created by that node run, every other field is the full new value.
//! [`PlanExecuteState::updater`] appends the records and replaces the rest, so the
//! record list is append-only for the whole run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channels::{BoxedStateUpdater, FieldBasedUpdater};

use super::partition::Partition;

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Planning,
    Classifying,
    Executing,
    Replanning,
    Terminal,
}

/// Outcome of one step execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    /// Placeholder for a step whose model call failed or timed out.
    Failed,
}

/// Result of executing one step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub step: String,
    pub detail: String,
    /// One-sentence summary used in later prompts instead of the full detail.
    pub summary: String,
    pub status: RecordStatus,
}

impl ExecutionRecord {
    pub fn completed(
        step: impl Into<String>,
        detail: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            detail: detail.into(),
            summary: summary.into(),
            status: RecordStatus::Completed,
        }
    }

    /// Placeholder record that keeps the failure visible in the final document.
    pub fn failed(step: impl Into<String>, error: &str) -> Self {
        let step = step.into();
        Self {
            detail: format!("### {}\n\n> This step could not be generated: {}", step, error),
            summary: format!("(failed: {})", error),
            step,
            status: RecordStatus::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RecordStatus::Completed
    }

    /// `"step: summary"`, the form prior work takes in every prompt.
    pub fn history_line(&self) -> String {
        format!("{}: {}", self.step, self.summary)
    }
}

/// State of one plan-execute run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanExecuteState {
    /// The raw goal (course outline, syllabus excerpt, ...).
    pub goal: String,
    /// Steps not executed yet, in order.
    pub plan: Vec<String>,
    /// Current classification of `plan`; lanes drain as steps execute.
    pub partition: Partition,
    pub records: Vec<ExecutionRecord>,
    /// Non-empty final reply from the replanner, when it ended the run.
    pub response: Option<String>,
    /// Aggregated output, set by the aggregate node.
    pub document: Option<String>,
    pub phase: Phase,
    /// Number of replanning rounds so far.
    pub cycle: usize,
    /// Node runs completed in this invocation, counted by the updater.
    #[serde(default)]
    pub node_runs: usize,
}

impl PlanExecuteState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Copy of the state without records; a node pushes the records it creates onto it.
    pub fn delta(&self) -> Self {
        Self {
            goal: self.goal.clone(),
            plan: self.plan.clone(),
            partition: self.partition.clone(),
            records: Vec::new(),
            response: self.response.clone(),
            document: self.document.clone(),
            phase: self.phase,
            cycle: self.cycle,
            node_runs: self.node_runs,
        }
    }

    /// History lines of all records so far, in causal order.
    pub fn history(&self) -> Vec<String> {
        self.records.iter().map(ExecutionRecord::history_line).collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Terminal
    }

    /// Removes the first occurrence of `step` from the remaining plan.
    pub fn truncate_step(&mut self, step: &str) {
        if let Some(pos) = self.plan.iter().position(|s| s == step) {
            self.plan.remove(pos);
        }
    }

    /// Merge strategy: append records, count the run, replace everything else.
    pub fn updater() -> BoxedStateUpdater<Self> {
        Arc::new(FieldBasedUpdater::new(
            |current: &mut PlanExecuteState, update: &PlanExecuteState| {
                current.records.extend(update.records.iter().cloned());
                current.goal = update.goal.clone();
                current.plan = update.plan.clone();
                current.partition = update.partition.clone();
                current.response = update.response.clone();
                current.document = update.document.clone();
                current.phase = update.phase;
                current.cycle = update.cycle;
                current.node_runs += 1;
            },
        ))
    }
}

/// Renders history lines for a prompt; `"null"` when there is none yet.
pub(crate) fn format_history(history: &[String]) -> String {
    if history.is_empty() {
        "null".to_string()
    } else {
        history
            .iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
