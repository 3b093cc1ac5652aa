//! Content pipelines built on the graph runtime.
//!
//! - [`plan_execute`]: plan-execute-replan lesson and experiment planners.
//! - [`outline`]: chapter outline extraction.
//! - [`syllabus`]: syllabus-driven lesson plan with concurrent chapters.
//! - [`quiz`]: quiz generation from requirements.
//! - [`grading`]: double-reviewed batch grading with arbitration.

pub mod grading;
pub mod outline;
pub mod plan_execute;
pub mod quiz;
pub mod syllabus;

pub use grading::{GradingConfig, GradingOutcome, GradingRequest, GradingRunner};
pub use outline::{ChapterItem, OutlineRequest, OutlineRunner, DEFAULT_HOURS_PER_CLASS};
pub use plan_execute::{
    ExecutionMode, PlanExecuteConfig, PlanExecuteModels, PlanExecuteOutcome, PlanExecuteRunner,
    RunError,
};
pub use quiz::{QuizConfig, QuizOutcome, QuizRunner};
pub use syllabus::{SyllabusConfig, SyllabusOutcome, SyllabusRunner};
