//! Chapter outline extraction: raw syllabus → ordered chapter list.
//!
//! Graph: START → extract → END. One structured model call; a failed call
//! yields an empty list.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;
use crate::graph::{CompilationError, CompiledStateGraph, LoggingNodeMiddleware, Next, Node};
use crate::llm::LlmClient;
use crate::prompts::{render, Prompts};
use crate::structured::{StructuredLlm, StructuredOutput};
use crate::{StateGraph, END, START};

use super::RunError;

/// Default class length in hours.
pub const DEFAULT_HOURS_PER_CLASS: u32 = 2;

/// One class session of the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterItem {
    /// Prefixed with its kind, e.g. "Chapter 1: ..." or "Lab 1: ...".
    pub title: String,
    /// Short summary of the session.
    pub content: String,
    pub order: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChapterList {
    chapters: Vec<ChapterItem>,
}

impl StructuredOutput for ChapterList {
    fn type_name() -> &'static str {
        "ChapterItemList"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "chapters": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string", "description": "Chapter title"},
                            "content": {"type": "string", "description": "Short summary of the chapter"},
                            "order": {"type": "integer", "description": "Position of the chapter"}
                        },
                        "required": ["title", "content", "order"]
                    }
                }
            },
            "required": ["chapters"]
        })
    }
}

/// Input of an outline run.
#[derive(Debug, Clone)]
pub struct OutlineRequest {
    pub syllabus: String,
    pub hours_per_class: u32,
    pub has_experiment: bool,
}

impl OutlineRequest {
    pub fn new(syllabus: impl Into<String>) -> Self {
        Self {
            syllabus: syllabus.into(),
            hours_per_class: DEFAULT_HOURS_PER_CLASS,
            has_experiment: false,
        }
    }
}

/// Graph state for the outline run.
#[derive(Debug, Clone, Default)]
pub struct OutlineState {
    pub syllabus: String,
    pub hours_per_class: u32,
    pub has_experiment: bool,
    pub chapters: Vec<ChapterItem>,
}

struct ExtractNode {
    llm: StructuredLlm,
    template: String,
}

#[async_trait]
impl Node<OutlineState> for ExtractNode {
    fn id(&self) -> &str {
        "extract"
    }

    async fn run(&self, state: OutlineState) -> Result<(OutlineState, Next), AgentError> {
        let hours = state.hours_per_class.to_string();
        let prompt = render(
            &self.template,
            &[
                ("hours_per_class", hours.as_str()),
                ("has_experiment", if state.has_experiment { "true" } else { "false" }),
                ("syllabus", state.syllabus.as_str()),
            ],
        );
        let mut chapters = match self.llm.invoke::<ChapterList>(&prompt).await {
            Ok(list) => list.chapters,
            Err(e) => {
                tracing::warn!(error = %e, "chapter extraction failed, returning no chapters");
                Vec::new()
            }
        };
        chapters.sort_by_key(|c| c.order);
        tracing::info!(count = chapters.len(), "chapters extracted");
        Ok((OutlineState { chapters, ..state }, Next::Continue))
    }
}

/// Outline runner: one-node graph around the extraction call.
pub struct OutlineRunner {
    compiled: CompiledStateGraph<OutlineState>,
}

impl OutlineRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: &Prompts,
        verbose: bool,
    ) -> Result<Self, CompilationError> {
        let extract = ExtractNode {
            llm: StructuredLlm::new(llm),
            template: prompts.outline.extract().to_string(),
        };
        let mut graph = StateGraph::<OutlineState>::new();
        graph
            .add_node("extract", Arc::new(extract))
            .add_edge(START, "extract")
            .add_edge("extract", END);
        let graph = if verbose {
            graph.with_middleware(Arc::new(LoggingNodeMiddleware::<OutlineState>::default()))
        } else {
            graph
        };
        Ok(Self {
            compiled: graph.compile()?,
        })
    }

    /// Chapters sorted by `order`; empty when the model call failed.
    pub async fn run(&self, request: OutlineRequest) -> Result<Vec<ChapterItem>, RunError> {
        let state = OutlineState {
            syllabus: request.syllabus,
            hours_per_class: request.hours_per_class,
            has_experiment: request.has_experiment,
            chapters: Vec::new(),
        };
        let out = self.compiled.invoke(state).await?;
        Ok(out.chapters)
    }
}
