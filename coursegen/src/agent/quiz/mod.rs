//! Quiz generation: plan question forms, group them by type, then write every
//! question concurrently.

mod runner;
mod state;

pub use runner::{render_quiz, QuestionWriter, QuizConfig, QuizOutcome, QuizRunner};
pub use state::{
    Difficulty, Question, QuestionForm, QuestionGroups, QuestionType, QuizOption, QuizState,
};
