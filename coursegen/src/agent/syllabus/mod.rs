//! Syllabus lesson-plan workflow: parse the syllabus into chapters, generate
//! every chapter concurrently, then polish the combined draft.

mod generator;
mod runner;
mod state;

pub use generator::ChapterGenerator;
pub use runner::{
    render_draft, SyllabusConfig, SyllabusOutcome, SyllabusRunner, SYLLABUS_FAILED_GRACEFULLY,
    SYLLABUS_FALLBACK_HEADING,
};
pub use state::{
    Activity, Chapter, ChapterResult, KnowledgeExplanation, SyllabusState, TimeAllocation,
};
