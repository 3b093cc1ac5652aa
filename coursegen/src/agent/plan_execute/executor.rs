//! Step executor: runs one step or a batch of steps and produces execution records.
//!
//! Executing never fails as a whole. A step whose agent call fails (or times out)
//! becomes a `Failed` placeholder record and its siblings are unaffected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::prompts::render;
use crate::retrieval::{RetrievalMode, Retriever};

use super::state::{format_history, ExecutionRecord};

/// Default bound on concurrently executing parallel steps.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

const FALLBACK_SUMMARY_CHARS: usize = 120;

/// Produces the detailed content for one step.
///
/// `history` holds `"step: summary"` lines of every earlier record.
#[async_trait]
pub trait StepAgent: Send + Sync {
    async fn execute(&self, step: &str, history: &[String]) -> Result<String, AgentError>;
}

/// Default step agent: optional knowledge-base lookup, then one model call.
pub struct RetrievalAugmentedAgent {
    llm: Arc<dyn LlmClient>,
    retriever: Option<Arc<dyn Retriever>>,
    mode: RetrievalMode,
    system_prompt: String,
    task_template: String,
}

impl RetrievalAugmentedAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        system_prompt: impl Into<String>,
        task_template: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            retriever: None,
            mode: RetrievalMode::default(),
            system_prompt: system_prompt.into(),
            task_template: task_template.into(),
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>, mode: RetrievalMode) -> Self {
        self.retriever = Some(retriever);
        self.mode = mode;
        self
    }

    async fn context_for(&self, step: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return "null".to_string();
        };
        match retriever.retrieve(step, self.mode).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => "null".to_string(),
            Err(e) => {
                tracing::warn!(step, error = %e, "retrieval failed, executing without context");
                "null".to_string()
            }
        }
    }
}

#[async_trait]
impl StepAgent for RetrievalAugmentedAgent {
    async fn execute(&self, step: &str, history: &[String]) -> Result<String, AgentError> {
        let context = self.context_for(step).await;
        let history = format_history(history);
        let task = render(
            &self.task_template,
            &[
                ("history", history.as_str()),
                ("context", context.as_str()),
                ("step", step),
            ],
        );
        let messages = [Message::system(self.system_prompt.clone()), Message::user(task)];
        let response = self.llm.invoke(&messages).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Condenses step detail into one sentence for later prompts.
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
    template: String,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmClient>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }

    /// Falls back to [`fallback_summary`] when the call fails or returns nothing.
    pub async fn summarize(&self, detail: &str) -> String {
        let prompt = render(&self.template, &[("detail", detail)]);
        match self.llm.invoke(&[Message::user(prompt)]).await {
            Ok(r) if !r.content.trim().is_empty() => r.content.trim().to_string(),
            Ok(_) => fallback_summary(detail),
            Err(e) => {
                tracing::warn!(error = %e, "summarizer failed, using first line of detail");
                fallback_summary(detail)
            }
        }
    }
}

/// First non-empty line of `detail` (markdown heading marks stripped), cut at a char boundary.
pub fn fallback_summary(detail: &str) -> String {
    let line = detail
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    if line.chars().count() > FALLBACK_SUMMARY_CHARS {
        let cut: String = line.chars().take(FALLBACK_SUMMARY_CHARS).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

/// Runs steps through a `StepAgent` and a `Summarizer`.
pub struct StepExecutor {
    agent: Arc<dyn StepAgent>,
    summarizer: Summarizer,
    max_concurrency: usize,
    step_timeout: Option<Duration>,
}

impl StepExecutor {
    pub fn new(agent: Arc<dyn StepAgent>, summarizer: Summarizer) -> Self {
        Self {
            agent,
            summarizer,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            step_timeout: None,
        }
    }

    /// Values below 1 are treated as 1.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    async fn call_agent(&self, step: &str, history: &[String]) -> Result<String, AgentError> {
        match self.step_timeout {
            Some(limit) => tokio::time::timeout(limit, self.agent.execute(step, history))
                .await
                .map_err(|_| AgentError::Timeout(limit))?,
            None => self.agent.execute(step, history).await,
        }
    }

    /// Executes one step; a failure yields a `Failed` placeholder record.
    pub async fn run_one(&self, step: &str, history: &[String]) -> ExecutionRecord {
        match self.call_agent(step, history).await {
            Ok(detail) => {
                let summary = self.summarizer.summarize(&detail).await;
                tracing::debug!(step, detail_chars = detail.len(), "step completed");
                ExecutionRecord::completed(step, detail, summary)
            }
            Err(e) => {
                tracing::warn!(step, error = %e, "step failed, recording placeholder");
                ExecutionRecord::failed(step, &e.to_string())
            }
        }
    }

    /// Executes `steps` concurrently (at most `max_concurrency` in flight).
    ///
    /// Records come back in input order, whatever order the steps finish in.
    pub async fn run_parallel(&self, steps: &[String], history: &[String]) -> Vec<ExecutionRecord> {
        tracing::info!(count = steps.len(), max_concurrency = self.max_concurrency, "parallel fan-out");
        let tasks: Vec<_> = steps
            .iter()
            .map(|step| self.run_one(step, history).boxed())
            .collect();
        stream::iter(tasks)
            .buffered(self.max_concurrency)
            .collect()
            .await
    }
}
