//! Library side of the `coursegen` binary: input resolution, client wiring from
//! [`config::Settings`], and one entry point per pipeline.
//!
//! `main.rs` only parses arguments, installs tracing and prints what these return.

use std::path::Path;
use std::sync::Arc;

use config::Settings;
use coursegen::graph::CompilationError;
use coursegen::prompts::Prompts;
use coursegen::retrieval::RetrievalError;
use coursegen::agent::quiz::render_quiz;
use coursegen::{
    ChatOpenAI, ChapterItem, ExecutionMode, GradingConfig, GradingRequest, GradingRunner,
    LightRagRetriever, LlmClient, OutlineRequest, OutlineRunner, PlanExecuteConfig,
    PlanExecuteModels, PlanExecuteRunner, QuizConfig, QuizRunner, RetrievalMode, Retriever,
    RunError, SyllabusConfig, SyllabusRunner,
};
use serde::Serialize;

/// Error type for CLI operations.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(#[from] config::LoadError),
    #[error("no input: pass text as arguments or use --file")]
    EmptyInput,
    #[error("cannot read {path}: {source}")]
    ReadInput {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid COURSEGEN_RAG_MODE: {0}")]
    RagMode(String),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Lesson,
    Experiment,
    Outline {
        hours_per_class: u32,
        has_experiment: bool,
    },
    Syllabus,
    Quiz,
    /// Input is a JSON [`GradingRequest`].
    Grade,
}

/// Per-invocation options shared by all pipelines.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub verbose: bool,
    /// Run the writer over the concatenated plan.
    pub polish: bool,
}

/// Input text: the file when given, else the positional words joined by spaces.
pub fn read_input(file: Option<&Path>, words: &[String]) -> Result<String, CliError> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|source| CliError::ReadInput {
            path: path.display().to_string(),
            source,
        })?,
        None => words.join(" "),
    };
    if text.trim().is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(text)
}

/// Model clients and the optional retriever, built once per process.
pub struct Clients {
    pub models: PlanExecuteModels,
    pub retriever: Option<Arc<dyn Retriever>>,
    pub retrieval_mode: RetrievalMode,
}

impl Clients {
    pub fn from_settings(settings: &Settings) -> Result<Self, CliError> {
        let chat = |model: &str| -> Arc<dyn LlmClient> {
            match settings.api_key.as_deref() {
                Some(key) => Arc::new(ChatOpenAI::with_credentials(
                    key,
                    settings.base_url.as_deref(),
                    model,
                )),
                None => Arc::new(ChatOpenAI::new(model)),
            }
        };
        let retrieval_mode = settings
            .rag_mode
            .parse::<RetrievalMode>()
            .map_err(CliError::RagMode)?;
        let retriever: Option<Arc<dyn Retriever>> = match settings.rag_url.as_deref() {
            Some(url) => Some(Arc::new(LightRagRetriever::new(url)?)),
            None => None,
        };
        Ok(Self {
            models: PlanExecuteModels {
                planner: chat(&settings.planner_model),
                executor: chat(&settings.executor_model),
                summarizer: chat(&settings.summarizer_model),
                writer: chat(&settings.writer_model),
            },
            retriever,
            retrieval_mode,
        })
    }
}

/// What a pipeline produced: the markdown document for humans, the full outcome for `--json`.
#[derive(Debug)]
pub struct Output {
    pub text: String,
    pub json: serde_json::Value,
}

#[derive(Serialize)]
struct OutlineOutput<'a> {
    chapters: &'a [ChapterItem],
}

/// Markdown list of the outline, one session per line.
pub fn format_outline(chapters: &[ChapterItem]) -> String {
    if chapters.is_empty() {
        return "(no chapters extracted)".to_string();
    }
    chapters
        .iter()
        .map(|c| format!("{}. {}\n   {}", c.order, c.title, c.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs `pipeline` over `input`.
pub async fn run_pipeline(
    pipeline: Pipeline,
    input: &str,
    clients: &Clients,
    settings: &Settings,
    prompts: &Prompts,
    opts: &RunOptions,
) -> Result<Output, CliError> {
    match pipeline {
        Pipeline::Lesson | Pipeline::Experiment => {
            let mode = if pipeline == Pipeline::Lesson {
                ExecutionMode::Partitioned
            } else {
                ExecutionMode::Sequential
            };
            let config = PlanExecuteConfig {
                mode,
                max_concurrency: settings.max_concurrency,
                max_cycles: settings.max_cycles,
                step_timeout: settings.step_timeout,
                polish: opts.polish,
                retrieval_mode: clients.retrieval_mode,
                verbose: opts.verbose,
                ..Default::default()
            };
            let runner = PlanExecuteRunner::new(
                clients.models.clone(),
                clients.retriever.clone(),
                prompts,
                config,
            )?;
            let outcome = runner.run(input).await?;
            Ok(Output {
                json: serde_json::to_value(&outcome)?,
                text: outcome.document,
            })
        }
        Pipeline::Outline {
            hours_per_class,
            has_experiment,
        } => {
            let runner = OutlineRunner::new(clients.models.planner.clone(), prompts, opts.verbose)?;
            let request = OutlineRequest {
                syllabus: input.to_string(),
                hours_per_class,
                has_experiment,
            };
            let chapters = runner.run(request).await?;
            Ok(Output {
                json: serde_json::to_value(OutlineOutput {
                    chapters: &chapters,
                })?,
                text: format_outline(&chapters),
            })
        }
        Pipeline::Syllabus => {
            let config = SyllabusConfig {
                max_concurrency: settings.max_concurrency,
                chapter_timeout: settings.step_timeout,
                retrieval_mode: clients.retrieval_mode,
                verbose: opts.verbose,
            };
            let runner = SyllabusRunner::new(
                clients.models.executor.clone(),
                clients.models.writer.clone(),
                clients.retriever.clone(),
                prompts,
                config,
            )?;
            let outcome = runner.run(input).await?;
            Ok(Output {
                json: serde_json::to_value(&outcome)?,
                text: outcome.document,
            })
        }
        Pipeline::Quiz => {
            let config = QuizConfig {
                max_concurrency: settings.max_concurrency,
                question_timeout: settings.step_timeout,
                verbose: opts.verbose,
            };
            let runner = QuizRunner::new(clients.models.executor.clone(), prompts, config)?;
            let outcome = runner.run(input).await?;
            Ok(Output {
                json: serde_json::to_value(&outcome)?,
                text: render_quiz(&outcome.questions),
            })
        }
        Pipeline::Grade => {
            let request: GradingRequest = serde_json::from_str(input)?;
            let config = GradingConfig {
                max_concurrency: settings.max_concurrency,
                verbose: opts.verbose,
            };
            let runner = GradingRunner::new(
                clients.models.executor.clone(),
                clients.models.planner.clone(),
                prompts,
                config,
            )?;
            let outcome = runner.run(request).await?;
            Ok(Output {
                json: serde_json::to_value(&outcome)?,
                text: outcome.to_markdown(),
            })
        }
    }
}
