//! Syllabus lesson-plan runner.
//!
//! Graph: START → parse → generate_chapters → finalize → END.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::agent::plan_execute::{polish_with_fallback, DEFAULT_MAX_CONCURRENCY};
use crate::error::AgentError;
use crate::graph::{CompilationError, CompiledStateGraph, LoggingNodeMiddleware, Next, Node};
use crate::llm::LlmClient;
use crate::prompts::{render, Prompts};
use crate::retrieval::{RetrievalMode, Retriever};
use crate::structured::StructuredLlm;
use crate::{StateGraph, END, START};

use super::generator::ChapterGenerator;
use super::state::{ChapterResult, SyllabusState, SyllabusStructure};
use crate::agent::RunError;

/// Heading placed above the raw draft when polishing fails.
pub const SYLLABUS_FALLBACK_HEADING: &str = "# Course lesson plan (fallback)";

/// Document produced when no chapter could be processed.
pub const SYLLABUS_FAILED_GRACEFULLY: &str =
    "# Course lesson plan\n\n> Generation failed gracefully: no chapter could be processed.";

/// Separator between chapters in the draft.
const CHAPTER_SEPARATOR: &str = "\n\n---\n\n";

struct ParseNode {
    llm: StructuredLlm,
    template: String,
}

#[async_trait]
impl Node<SyllabusState> for ParseNode {
    fn id(&self) -> &str {
        "parse"
    }

    async fn run(&self, state: SyllabusState) -> Result<(SyllabusState, Next), AgentError> {
        let prompt = render(&self.template, &[("syllabus", state.syllabus.as_str())]);
        let chapters = match self.llm.invoke::<SyllabusStructure>(&prompt).await {
            Ok(parsed) => parsed.chapters,
            Err(e) => {
                tracing::warn!(error = %e, "syllabus parsing failed, continuing without chapters");
                Vec::new()
            }
        };
        tracing::info!(count = chapters.len(), "syllabus parsed");
        Ok((SyllabusState { chapters, ..state }, Next::Continue))
    }
}

struct GenerateChaptersNode {
    generator: ChapterGenerator,
}

#[async_trait]
impl Node<SyllabusState> for GenerateChaptersNode {
    fn id(&self) -> &str {
        "generate_chapters"
    }

    async fn run(&self, state: SyllabusState) -> Result<(SyllabusState, Next), AgentError> {
        let results = self.generator.generate_all(&state.chapters).await;
        Ok((SyllabusState { results, ..state }, Next::Continue))
    }
}

struct FinalizeNode {
    writer: Arc<dyn LlmClient>,
    template: String,
}

#[async_trait]
impl Node<SyllabusState> for FinalizeNode {
    fn id(&self) -> &str {
        "finalize"
    }

    async fn run(&self, state: SyllabusState) -> Result<(SyllabusState, Next), AgentError> {
        let document = if state.results.is_empty() {
            tracing::warn!("no chapter results, emitting failed-gracefully document");
            SYLLABUS_FAILED_GRACEFULLY.to_string()
        } else {
            let draft = render_draft(&state.results);
            polish_with_fallback(
                self.writer.as_ref(),
                &self.template,
                &draft,
                SYLLABUS_FALLBACK_HEADING,
            )
            .await
        };
        Ok((
            SyllabusState {
                document: Some(document),
                ..state
            },
            Next::Continue,
        ))
    }
}

/// Chapters in syllabus order, separated by a horizontal rule.
pub fn render_draft(results: &[ChapterResult]) -> String {
    results
        .iter()
        .map(ChapterResult::to_markdown)
        .collect::<Vec<_>>()
        .join(CHAPTER_SEPARATOR)
}

#[derive(Debug, Clone)]
pub struct SyllabusConfig {
    pub max_concurrency: usize,
    pub chapter_timeout: Option<Duration>,
    pub retrieval_mode: RetrievalMode,
    pub verbose: bool,
}

impl Default for SyllabusConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            chapter_timeout: None,
            retrieval_mode: RetrievalMode::default(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyllabusOutcome {
    pub document: String,
    pub chapters: Vec<ChapterResult>,
}

/// Runs the syllabus workflow end to end.
pub struct SyllabusRunner {
    compiled: CompiledStateGraph<SyllabusState>,
}

impl SyllabusRunner {
    /// `llm` handles parsing and chapter generation, `writer` the final polish.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        writer: Arc<dyn LlmClient>,
        retriever: Option<Arc<dyn Retriever>>,
        prompts: &Prompts,
        config: SyllabusConfig,
    ) -> Result<Self, CompilationError> {
        let p = &prompts.syllabus;
        let structured = StructuredLlm::new(llm);
        let mut generator = ChapterGenerator::new(structured.clone(), p.explain(), p.allocate_time())
            .with_max_concurrency(config.max_concurrency)
            .with_chapter_timeout(config.chapter_timeout);
        if let Some(retriever) = retriever {
            generator = generator.with_retriever(retriever, config.retrieval_mode);
        }

        let mut graph = StateGraph::<SyllabusState>::new();
        graph
            .add_node(
                "parse",
                Arc::new(ParseNode {
                    llm: structured,
                    template: p.parse().to_string(),
                }),
            )
            .add_node("generate_chapters", Arc::new(GenerateChaptersNode { generator }))
            .add_node(
                "finalize",
                Arc::new(FinalizeNode {
                    writer,
                    template: p.polish().to_string(),
                }),
            )
            .add_edge(START, "parse")
            .add_edge("parse", "generate_chapters")
            .add_edge("generate_chapters", "finalize")
            .add_edge("finalize", END);

        let graph = if config.verbose {
            graph.with_middleware(Arc::new(LoggingNodeMiddleware::<SyllabusState>::default()))
        } else {
            graph
        };
        Ok(Self {
            compiled: graph.compile()?,
        })
    }

    pub async fn run(&self, syllabus: &str) -> Result<SyllabusOutcome, RunError> {
        let state = SyllabusState {
            syllabus: syllabus.to_string(),
            ..Default::default()
        };
        let out = self.compiled.invoke(state).await?;
        Ok(SyllabusOutcome {
            document: out
                .document
                .unwrap_or_else(|| SYLLABUS_FAILED_GRACEFULLY.to_string()),
            chapters: out.results,
        })
    }
}
