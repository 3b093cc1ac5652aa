//! Quiz runner.
//!
//! Graph: START → plan → classify → generate → END. The planner decides the
//! question forms, classify groups them by type without a model call, and
//! generate writes one question per form with bounded concurrency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;

use crate::agent::plan_execute::DEFAULT_MAX_CONCURRENCY;
use crate::agent::RunError;
use crate::error::AgentError;
use crate::graph::{CompilationError, CompiledStateGraph, LoggingNodeMiddleware, Next, Node};
use crate::llm::LlmClient;
use crate::prompts::{render, Prompts};
use crate::structured::StructuredLlm;
use crate::{StateGraph, END, START};

use super::state::{Question, QuestionForm, QuestionGroups, QuizPlan, QuizState};

struct PlanNode {
    llm: StructuredLlm,
    template: String,
}

#[async_trait]
impl Node<QuizState> for PlanNode {
    fn id(&self) -> &str {
        "plan"
    }

    async fn run(&self, state: QuizState) -> Result<(QuizState, Next), AgentError> {
        let prompt = render(&self.template, &[("requirements", state.requirements.as_str())]);
        let plan = match self.llm.invoke::<QuizPlan>(&prompt).await {
            Ok(plan) => plan.questions,
            Err(e) => {
                tracing::warn!(error = %e, "quiz planning failed, continuing with an empty plan");
                Vec::new()
            }
        };
        tracing::info!(questions = plan.len(), "quiz planned");
        Ok((QuizState { plan, ..state }, Next::Continue))
    }
}

struct ClassifyNode;

#[async_trait]
impl Node<QuizState> for ClassifyNode {
    fn id(&self) -> &str {
        "classify"
    }

    async fn run(&self, state: QuizState) -> Result<(QuizState, Next), AgentError> {
        let groups = QuestionGroups::from_plan(&state.plan);
        tracing::debug!(
            single = groups.single_choice.len(),
            multiple = groups.multiple_choice.len(),
            short = groups.short_answer.len(),
            "question forms grouped"
        );
        Ok((QuizState { groups, ..state }, Next::Continue))
    }
}

/// Writes questions concurrently; a failed or invalid question becomes a placeholder.
pub struct QuestionWriter {
    llm: StructuredLlm,
    template: String,
    max_concurrency: usize,
    question_timeout: Option<Duration>,
}

impl QuestionWriter {
    pub fn new(llm: StructuredLlm, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            question_timeout: None,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_question_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.question_timeout = timeout;
        self
    }

    /// One question per form, in input order.
    pub async fn write_all(&self, forms: &[QuestionForm]) -> Vec<Question> {
        let tasks: Vec<_> = forms
            .iter()
            .map(|form| self.write_or_placeholder(form).boxed())
            .collect();
        stream::iter(tasks)
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    async fn write_or_placeholder(&self, form: &QuestionForm) -> Question {
        match self.write_bounded(form).await {
            Ok(question) => question,
            Err(e) => {
                tracing::warn!(
                    knowledge_points = %form.knowledge_points,
                    error = %e,
                    "question failed, recording placeholder"
                );
                Question::failed(form, &e)
            }
        }
    }

    async fn write_bounded(&self, form: &QuestionForm) -> Result<Question, String> {
        match self.question_timeout {
            Some(limit) => tokio::time::timeout(limit, self.write(form))
                .await
                .map_err(|_| AgentError::Timeout(limit).to_string())?,
            None => self.write(form).await,
        }
    }

    async fn write(&self, form: &QuestionForm) -> Result<Question, String> {
        let described = form.describe();
        let prompt = render(
            &self.template,
            &[
                ("question_type", form.question_type.as_str()),
                ("form", described.as_str()),
            ],
        );
        let mut question = self
            .llm
            .invoke::<Question>(&prompt)
            .await
            .map_err(|e| e.to_string())?;
        question.question_type = form.question_type;
        question.difficulty = form.difficulty;
        question.error = None;
        question.validate()?;
        Ok(question)
    }
}

struct GenerateNode {
    writer: QuestionWriter,
}

#[async_trait]
impl Node<QuizState> for GenerateNode {
    fn id(&self) -> &str {
        "generate"
    }

    async fn run(&self, state: QuizState) -> Result<(QuizState, Next), AgentError> {
        if state.groups.is_empty() {
            tracing::warn!("quiz plan is empty, skipping generation");
            return Ok((state, Next::Continue));
        }
        let questions = self.writer.write_all(&state.groups.ordered()).await;
        let failed = questions.iter().filter(|q| q.is_placeholder()).count();
        tracing::info!(questions = questions.len(), failed, "quiz generated");
        Ok((QuizState { questions, ..state }, Next::Continue))
    }
}

/// Numbered questions separated by blank lines.
pub fn render_quiz(questions: &[Question]) -> String {
    if questions.is_empty() {
        return "(no questions generated)".to_string();
    }
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| q.to_markdown(i + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub max_concurrency: usize,
    /// Deadline for one question; an expired question becomes a placeholder.
    pub question_timeout: Option<Duration>,
    pub verbose: bool,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            question_timeout: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizOutcome {
    pub plan: Vec<QuestionForm>,
    /// Single choice, then multiple choice, then short answer.
    pub questions: Vec<Question>,
}

pub struct QuizRunner {
    compiled: CompiledStateGraph<QuizState>,
}

impl QuizRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: &Prompts,
        config: QuizConfig,
    ) -> Result<Self, CompilationError> {
        let structured = StructuredLlm::new(llm);
        let writer = QuestionWriter::new(structured.clone(), prompts.quiz.question())
            .with_max_concurrency(config.max_concurrency)
            .with_question_timeout(config.question_timeout);

        let mut graph = StateGraph::<QuizState>::new();
        graph
            .add_node(
                "plan",
                Arc::new(PlanNode {
                    llm: structured,
                    template: prompts.quiz.planner().to_string(),
                }),
            )
            .add_node("classify", Arc::new(ClassifyNode))
            .add_node("generate", Arc::new(GenerateNode { writer }))
            .add_edge(START, "plan")
            .add_edge("plan", "classify")
            .add_edge("classify", "generate")
            .add_edge("generate", END);

        let graph = if config.verbose {
            graph.with_middleware(Arc::new(LoggingNodeMiddleware::<QuizState>::default()))
        } else {
            graph
        };
        Ok(Self {
            compiled: graph.compile()?,
        })
    }

    pub async fn run(&self, requirements: &str) -> Result<QuizOutcome, RunError> {
        let state = QuizState {
            requirements: requirements.to_string(),
            ..Default::default()
        };
        let out = self.compiled.invoke(state).await?;
        Ok(QuizOutcome {
            plan: out.plan,
            questions: out.questions,
        })
    }
}
