//! # Coursegen
//!
//! LLM-driven course content pipelines (lesson plans, lab plans, chapter outlines)
//! built as directed graphs of prompt-calling steps, with a **state-in, state-out**
//! graph runtime: one state type flows through the nodes of each pipeline.
//!
//! ## Pipelines
//!
//! - **Plan-execute-replan** ([`PlanExecuteRunner`]): decomposes a goal into steps,
//!   classifies them into pre / parallel / post lanes, executes the lanes (parallel
//!   steps with bounded concurrency), replans on partial progress and aggregates the
//!   records into a document. [`ExecutionMode::Partitioned`] is the lesson planner,
//!   [`ExecutionMode::Sequential`] the experiment planner.
//! - **Chapter outline** ([`OutlineRunner`]): syllabus → ordered [`ChapterItem`] list.
//! - **Syllabus lesson plan** ([`SyllabusRunner`]): parse the syllabus, generate every
//!   chapter concurrently, polish the combined draft.
//! - **Quiz** ([`QuizRunner`]): plan question forms, group them by type, write every
//!   question concurrently.
//! - **Batch grading** ([`GradingRunner`]): two reviews per answer, arbitration when the
//!   scores differ by at least 0.2, final scores and a class report.
//!
//! Model failures never abort a run. Parse failures fall back to empty values, failed
//! steps and chapters become visible placeholders, and a failed polish keeps the raw draft.
//!
//! ## Main modules
//!
//! - [`graph`]: [`StateGraph`], [`CompiledStateGraph`], [`Node`], [`Next`], retry and middleware.
//! - [`channels`]: [`StateUpdater`], [`FieldBasedUpdater`] for merging node output into state.
//! - [`llm`]: [`LlmClient`] trait, [`MockLlm`], OpenAI-compatible [`ChatOpenAI`].
//! - [`structured`]: [`StructuredLlm`], the schema-validated model call.
//! - [`retrieval`]: [`Retriever`] trait, [`LightRagRetriever`], [`MockRetriever`].
//! - [`prompts`]: embedded YAML templates with a `PROMPTS_DIR` override.
//! - [`agent`]: the pipelines.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coursegen::{MockLlm, PlanExecuteConfig, PlanExecuteModels, PlanExecuteRunner};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = Arc::new(MockLlm::new(r#"{"steps": []}"#));
//! let prompts = coursegen::prompts::load_or_default(None);
//! let runner = PlanExecuteRunner::new(
//!     PlanExecuteModels::shared(llm),
//!     None,
//!     &prompts,
//!     PlanExecuteConfig::default(),
//! )?;
//! let outcome = runner.run("Teach binary search").await?;
//! println!("{}", outcome.document);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod channels;
pub mod error;
pub mod graph;
pub mod llm;
pub mod message;
pub mod prompts;
pub mod retrieval;
pub mod structured;

pub use agent::grading::{
    GradingConfig, GradingOutcome, GradingRequest, GradingRunner, StudentAnswer,
};
pub use agent::outline::{ChapterItem, OutlineRequest, OutlineRunner};
pub use agent::plan_execute::{
    ExecutionMode, ExecutionRecord, Partition, PlanExecuteConfig, PlanExecuteModels,
    PlanExecuteOutcome, PlanExecuteRunner, PlanExecuteState, RunError,
};
pub use agent::quiz::{Question, QuestionForm, QuizConfig, QuizOutcome, QuizRunner};
pub use agent::syllabus::{SyllabusConfig, SyllabusOutcome, SyllabusRunner};
pub use channels::{BoxedStateUpdater, FieldBasedUpdater, ReplaceUpdater, StateUpdater};
pub use error::AgentError;
pub use graph::{
    CompilationError, CompiledStateGraph, LoggingNodeMiddleware, Next, Node, NodeMiddleware,
    RetryPolicy, StateGraph, END, START,
};
pub use llm::{ChatOpenAI, LlmClient, LlmResponse, MockLlm, MockReply};
pub use message::Message;
pub use prompts::Prompts;
pub use retrieval::{LightRagRetriever, MockRetriever, RetrievalMode, Retriever};
pub use structured::{InvokeError, StructuredLlm, StructuredOutput};

/// When running `cargo test -p coursegen`, initializes tracing from `RUST_LOG` so that
/// unit tests in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
