//! Batch grading of one question: double review, arbitration of disputed scores,
//! final scores and a class report.

mod runner;
mod state;

pub use runner::{Grader, GradingConfig, GradingOutcome, GradingRunner};
pub use state::{
    DetectedError, FinalGrade, GradingReport, GradingRequest, GradingState, Review, Reviewer,
    StudentAnswer, StudentReviews, SCORE_DIFFERENCE_THRESHOLD,
};
