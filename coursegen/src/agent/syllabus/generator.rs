//! Per-chapter content generation: explanations, then a time allocation.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use futures::FutureExt;

use crate::error::AgentError;
use crate::prompts::render;
use crate::retrieval::{RetrievalMode, Retriever};
use crate::structured::StructuredLlm;

use super::state::{
    Chapter, ChapterResult, Explanations, KnowledgeExplanation, TimeAllocation,
};

/// Generates chapters concurrently; every part degrades to placeholder text on failure.
pub struct ChapterGenerator {
    llm: StructuredLlm,
    retriever: Option<Arc<dyn Retriever>>,
    mode: RetrievalMode,
    explain_template: String,
    allocate_template: String,
    max_concurrency: usize,
    chapter_timeout: Option<Duration>,
}

impl ChapterGenerator {
    pub fn new(
        llm: StructuredLlm,
        explain_template: impl Into<String>,
        allocate_template: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            retriever: None,
            mode: RetrievalMode::default(),
            explain_template: explain_template.into(),
            allocate_template: allocate_template.into(),
            max_concurrency: crate::agent::plan_execute::DEFAULT_MAX_CONCURRENCY,
            chapter_timeout: None,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>, mode: RetrievalMode) -> Self {
        self.retriever = Some(retriever);
        self.mode = mode;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Deadline for one whole chapter; an expired chapter becomes a "(failed)" placeholder.
    pub fn with_chapter_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chapter_timeout = timeout;
        self
    }

    /// Results in syllabus order.
    pub async fn generate_all(&self, chapters: &[Chapter]) -> Vec<ChapterResult> {
        if chapters.is_empty() {
            tracing::warn!("syllabus has no chapters, skipping generation");
            return Vec::new();
        }
        let tasks: Vec<_> = chapters
            .iter()
            .map(|chapter| self.generate_or_placeholder(chapter).boxed())
            .collect();
        stream::iter(tasks)
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    async fn generate_or_placeholder(&self, chapter: &Chapter) -> ChapterResult {
        match self.generate_bounded(chapter).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(chapter = %chapter.title, error = %e, "chapter failed, recording placeholder");
                ChapterResult::failed(chapter, &e.to_string())
            }
        }
    }

    async fn generate_bounded(&self, chapter: &Chapter) -> Result<ChapterResult, AgentError> {
        match self.chapter_timeout {
            Some(limit) => tokio::time::timeout(limit, self.generate(chapter))
                .await
                .map_err(|_| AgentError::Timeout(limit)),
            None => Ok(self.generate(chapter).await),
        }
    }

    /// One chapter: explanations for each knowledge point, then a time allocation.
    pub async fn generate(&self, chapter: &Chapter) -> ChapterResult {
        tracing::info!(chapter = %chapter.title, points = chapter.knowledge_points.len(), "generating chapter");
        let explanations = self.explain(chapter).await;
        let knowledge: Vec<KnowledgeExplanation> = chapter
            .knowledge_points
            .iter()
            .zip(explanations)
            .map(|(point, explanation)| KnowledgeExplanation {
                knowledge_point: point.clone(),
                explanation,
            })
            .collect();
        let time_allocation = self.allocate_time(&chapter.title, &knowledge).await;
        ChapterResult {
            title: chapter.title.clone(),
            knowledge,
            time_allocation,
            error: None,
        }
    }

    async fn context_for(&self, chapter: &Chapter) -> String {
        let Some(retriever) = &self.retriever else {
            return "null".to_string();
        };
        let query = format!("{}: {}", chapter.title, chapter.knowledge_points.join(", "));
        match retriever.retrieve(&query, self.mode).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => "null".to_string(),
            Err(e) => {
                tracing::warn!(chapter = %chapter.title, error = %e, "retrieval failed, explaining without context");
                "null".to_string()
            }
        }
    }

    async fn explain(&self, chapter: &Chapter) -> Vec<String> {
        let points = &chapter.knowledge_points;
        if points.is_empty() {
            return Vec::new();
        }
        let context = self.context_for(chapter).await;
        let listing = points
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render(
            &self.explain_template,
            &[
                ("chapter_title", chapter.title.as_str()),
                ("knowledge_points", listing.as_str()),
                ("context", context.as_str()),
            ],
        );
        match self.llm.invoke::<Explanations>(&prompt).await {
            Ok(Explanations(list)) if list.len() == points.len() => list,
            Ok(Explanations(list)) => {
                tracing::warn!(
                    chapter = %chapter.title,
                    expected = points.len(),
                    got = list.len(),
                    "explanation count mismatch, using placeholders"
                );
                placeholders(points)
            }
            Err(e) => {
                tracing::warn!(chapter = %chapter.title, error = %e, "explanations failed, using placeholders");
                placeholders(points)
            }
        }
    }

    async fn allocate_time(&self, title: &str, knowledge: &[KnowledgeExplanation]) -> TimeAllocation {
        let mut content = format!("Chapter: {}\n\nKnowledge points:\n", title);
        for k in knowledge {
            content.push_str(&format!("- {}: {}\n", k.knowledge_point, k.explanation));
        }
        let prompt = render(&self.allocate_template, &[("chapter_content", content.as_str())]);
        match self.llm.invoke::<TimeAllocation>(&prompt).await {
            Ok(allocation) => allocation,
            Err(e) => {
                tracing::warn!(chapter = %title, error = %e, "time allocation failed");
                TimeAllocation::failed()
            }
        }
    }
}

fn placeholders(points: &[String]) -> Vec<String> {
    points
        .iter()
        .map(|p| format!("Explanation of '{}' could not be generated.", p))
        .collect()
}
