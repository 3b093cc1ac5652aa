//! Batch grading runner.
//!
//! Graph: START → initial_review → (arbitration) → final_scores → report → END.
//! Every answer is reviewed twice concurrently; answers whose two scores are at
//! least [`SCORE_DIFFERENCE_THRESHOLD`] apart get a third, arbitrating review.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;

use crate::agent::plan_execute::DEFAULT_MAX_CONCURRENCY;
use crate::agent::quiz::Question;
use crate::agent::RunError;
use crate::error::AgentError;
use crate::graph::{CompilationError, CompiledStateGraph, LoggingNodeMiddleware, Next, Node};
use crate::llm::LlmClient;
use crate::prompts::{render, Prompts};
use crate::structured::StructuredLlm;
use crate::{StateGraph, END, START};

use super::state::{
    FinalGrade, GradingReport, GradingRequest, GradingState, Review, ReviewReply, Reviewer,
    StudentAnswer, StudentReviews, SCORE_DIFFERENCE_THRESHOLD,
};

/// Reviews answers with the reviewer and arbitrator models; failed reviews are dropped.
pub struct Grader {
    reviewer: StructuredLlm,
    arbitrator: StructuredLlm,
    template: String,
    max_concurrency: usize,
}

impl Grader {
    pub fn new(
        reviewer: StructuredLlm,
        arbitrator: StructuredLlm,
        template: impl Into<String>,
    ) -> Self {
        Self {
            reviewer,
            arbitrator,
            template: template.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Reviewer A and reviewer B for every answer, in answer order.
    pub async fn review_all(
        &self,
        question: &Question,
        answers: &[StudentAnswer],
    ) -> Vec<StudentReviews> {
        let tasks: Vec<_> = answers
            .iter()
            .flat_map(|answer| {
                [Reviewer::ReviewerA, Reviewer::ReviewerB]
                    .into_iter()
                    .map(move |reviewer| (answer, reviewer))
            })
            .map(|(answer, reviewer)| self.review(question, answer, reviewer).boxed())
            .collect();
        let results: Vec<Option<Review>> = stream::iter(tasks)
            .buffered(self.max_concurrency)
            .collect()
            .await;
        answers
            .iter()
            .zip(results.chunks(2))
            .map(|(answer, pair)| StudentReviews {
                student_id: answer.student_id.clone(),
                reviews: pair.iter().flatten().cloned().collect(),
            })
            .collect()
    }

    /// Adds an arbitrator review to every entry that needs one.
    pub async fn arbitrate(
        &self,
        question: &Question,
        answers: &[StudentAnswer],
        reviews: &[StudentReviews],
    ) -> Vec<StudentReviews> {
        let tasks: Vec<_> = answers
            .iter()
            .zip(reviews)
            .map(|(answer, entry)| {
                let needed = entry.needs_arbitration();
                async move {
                    if needed {
                        self.review(question, answer, Reviewer::Arbitrator).await
                    } else {
                        None
                    }
                }
                .boxed()
            })
            .collect();
        let verdicts: Vec<Option<Review>> = stream::iter(tasks)
            .buffered(self.max_concurrency)
            .collect()
            .await;
        reviews
            .iter()
            .zip(verdicts)
            .map(|(entry, verdict)| {
                let mut entry = entry.clone();
                entry.reviews.extend(verdict);
                entry
            })
            .collect()
    }

    async fn review(
        &self,
        question: &Question,
        answer: &StudentAnswer,
        reviewer: Reviewer,
    ) -> Option<Review> {
        let prompt = render(
            &self.template,
            &[
                ("reviewer", reviewer.as_str()),
                ("question_text", question.question_text.as_str()),
                ("correct_answer", question.correct_answer.as_str()),
                ("answer_explanation", question.answer_explanation.as_str()),
                ("student_id", answer.student_id.as_str()),
                ("answer", answer.answer.as_str()),
            ],
        );
        let llm = match reviewer {
            Reviewer::Arbitrator => &self.arbitrator,
            _ => &self.reviewer,
        };
        match llm.invoke::<ReviewReply>(&prompt).await {
            Ok(reply) => Some(Review::from_reply(&answer.student_id, reviewer, reply)),
            Err(e) => {
                tracing::warn!(
                    student_id = %answer.student_id,
                    reviewer = reviewer.as_str(),
                    error = %e,
                    "review failed, dropping it"
                );
                None
            }
        }
    }
}

struct InitialReviewNode {
    grader: Arc<Grader>,
}

#[async_trait]
impl Node<GradingState> for InitialReviewNode {
    fn id(&self) -> &str {
        "initial_review"
    }

    async fn run(&self, state: GradingState) -> Result<(GradingState, Next), AgentError> {
        let reviews = self
            .grader
            .review_all(&state.request.question, &state.request.student_answers)
            .await;
        let disputed = reviews.iter().filter(|r| r.needs_arbitration()).count();
        tracing::info!(students = reviews.len(), disputed, "initial review done");
        Ok((GradingState { reviews, ..state }, Next::Continue))
    }
}

struct ArbitrationNode {
    grader: Arc<Grader>,
}

#[async_trait]
impl Node<GradingState> for ArbitrationNode {
    fn id(&self) -> &str {
        "arbitration"
    }

    async fn run(&self, state: GradingState) -> Result<(GradingState, Next), AgentError> {
        let reviews = self
            .grader
            .arbitrate(
                &state.request.question,
                &state.request.student_answers,
                &state.reviews,
            )
            .await;
        Ok((GradingState { reviews, ..state }, Next::Continue))
    }
}

struct FinalScoresNode;

#[async_trait]
impl Node<GradingState> for FinalScoresNode {
    fn id(&self) -> &str {
        "final_scores"
    }

    async fn run(&self, state: GradingState) -> Result<(GradingState, Next), AgentError> {
        let mut grades = Vec::new();
        let mut ungraded = Vec::new();
        for entry in &state.reviews {
            match entry.final_grade() {
                Some(grade) => grades.push(grade),
                None => {
                    tracing::warn!(student_id = %entry.student_id, reviews = entry.reviews.len(), "missing initial review, leaving ungraded");
                    ungraded.push(entry.student_id.clone());
                }
            }
        }
        Ok((
            GradingState {
                grades,
                ungraded,
                ..state
            },
            Next::Continue,
        ))
    }
}

struct ReportNode {
    llm: StructuredLlm,
    template: String,
}

fn format_grades(grades: &[FinalGrade]) -> String {
    grades
        .iter()
        .map(|g| {
            format!(
                "- {}: {:.2}{} | {}",
                g.student_id,
                g.final_score,
                if g.is_controversial { " (arbitrated)" } else { "" },
                g.final_analysis.replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Node<GradingState> for ReportNode {
    fn id(&self) -> &str {
        "report"
    }

    async fn run(&self, state: GradingState) -> Result<(GradingState, Next), AgentError> {
        let report = if state.grades.is_empty() {
            tracing::warn!("no graded answers, skipping report");
            GradingReport::unavailable("no answer could be graded")
        } else {
            let results = format_grades(&state.grades);
            let prompt = render(
                &self.template,
                &[
                    ("question_text", state.request.question.question_text.as_str()),
                    ("results", results.as_str()),
                ],
            );
            match self.llm.invoke::<GradingReport>(&prompt).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(error = %e, "report generation failed");
                    GradingReport::unavailable(&e.to_string())
                }
            }
        };
        Ok((
            GradingState {
                report: Some(report),
                ..state
            },
            Next::Continue,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct GradingConfig {
    pub max_concurrency: usize,
    pub verbose: bool,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GradingOutcome {
    /// In answer order; ungraded students are skipped.
    pub grades: Vec<FinalGrade>,
    pub ungraded: Vec<String>,
    pub report: GradingReport,
    pub reviews: Vec<StudentReviews>,
}

impl GradingOutcome {
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Grading\n\n");
        for g in &self.grades {
            out.push_str(&format!(
                "- **{}**: {:.2}{}\n",
                g.student_id,
                g.final_score,
                if g.is_controversial { " (arbitrated)" } else { "" }
            ));
        }
        if !self.ungraded.is_empty() {
            out.push_str(&format!("\nUngraded: {}\n", self.ungraded.join(", ")));
        }
        out.push_str(&format!(
            "\n## Report\n\n{}\n",
            self.report.overall_performance_summary
        ));
        let sections = [
            ("Common errors", &self.report.common_error_patterns),
            ("Teaching suggestions", &self.report.teaching_suggestions),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            out.push_str(&format!("\n### {}\n", title));
            for item in items {
                out.push_str(&format!("- {}\n", item));
            }
        }
        out.trim_end().to_string()
    }
}

pub struct GradingRunner {
    compiled: CompiledStateGraph<GradingState>,
}

impl GradingRunner {
    /// `reviewer` grades every answer twice; `arbitrator` settles disputes and writes the report.
    pub fn new(
        reviewer: Arc<dyn LlmClient>,
        arbitrator: Arc<dyn LlmClient>,
        prompts: &Prompts,
        config: GradingConfig,
    ) -> Result<Self, CompilationError> {
        let arbitrator = StructuredLlm::new(arbitrator);
        let grader = Arc::new(
            Grader::new(
                StructuredLlm::new(reviewer),
                arbitrator.clone(),
                prompts.grading.review(),
            )
            .with_max_concurrency(config.max_concurrency),
        );

        let mut graph = StateGraph::<GradingState>::new();
        graph
            .add_node(
                "initial_review",
                Arc::new(InitialReviewNode {
                    grader: grader.clone(),
                }),
            )
            .add_node("arbitration", Arc::new(ArbitrationNode { grader }))
            .add_node("final_scores", Arc::new(FinalScoresNode))
            .add_node(
                "report",
                Arc::new(ReportNode {
                    llm: arbitrator,
                    template: prompts.grading.report().to_string(),
                }),
            )
            .add_edge(START, "initial_review")
            .add_conditional_edges(
                "initial_review",
                Arc::new(|s: &GradingState| {
                    let next = if s.needs_arbitration() {
                        "arbitration"
                    } else {
                        "final_scores"
                    };
                    next.to_string()
                }),
                Some(
                    ["arbitration", "final_scores"]
                        .iter()
                        .map(|t| (t.to_string(), t.to_string()))
                        .collect::<HashMap<_, _>>(),
                ),
            )
            .add_edge("arbitration", "final_scores")
            .add_edge("final_scores", "report")
            .add_edge("report", END);

        let graph = if config.verbose {
            graph.with_middleware(Arc::new(LoggingNodeMiddleware::<GradingState>::default()))
        } else {
            graph
        };
        Ok(Self {
            compiled: graph.compile()?,
        })
    }

    pub async fn run(&self, request: GradingRequest) -> Result<GradingOutcome, RunError> {
        tracing::info!(
            answers = request.student_answers.len(),
            threshold = SCORE_DIFFERENCE_THRESHOLD,
            "grading run started"
        );
        let out = self.compiled.invoke(GradingState::new(request)).await?;
        Ok(GradingOutcome {
            grades: out.grades,
            ungraded: out.ungraded,
            report: out
                .report
                .unwrap_or_else(|| GradingReport::unavailable("report step did not run")),
            reviews: out.reviews,
        })
    }
}
