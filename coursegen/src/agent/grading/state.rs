//! Grading state, model outputs and the score arithmetic.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::quiz::Question;
use crate::structured::StructuredOutput;

/// Reviewer scores at least this far apart go to the arbitrator.
pub const SCORE_DIFFERENCE_THRESHOLD: f64 = 0.2;

/// Slack for score differences that land on the threshold after float rounding.
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub student_id: String,
    pub answer: String,
}

/// One question and the class's answers to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingRequest {
    pub question: Question,
    pub student_answers: Vec<StudentAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reviewer {
    #[serde(rename = "reviewer_A")]
    ReviewerA,
    #[serde(rename = "reviewer_B")]
    ReviewerB,
    #[serde(rename = "arbitrator")]
    Arbitrator,
}

impl Reviewer {
    pub fn as_str(self) -> &'static str {
        match self {
            Reviewer::ReviewerA => "reviewer_A",
            Reviewer::ReviewerB => "reviewer_B",
            Reviewer::Arbitrator => "arbitrator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedError {
    pub error_description: String,
    pub correction_suggestion: String,
}

/// What the model returns for one answer.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ReviewReply {
    pub is_correct: bool,
    pub score: f64,
    pub analysis: String,
    #[serde(default)]
    pub errors: Vec<DetectedError>,
}

impl StructuredOutput for ReviewReply {
    fn type_name() -> &'static str {
        "GradingResult"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "is_correct": {"type": "boolean"},
                "score": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                "analysis": {"type": "string"},
                "errors": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "error_description": {"type": "string"},
                            "correction_suggestion": {"type": "string"}
                        },
                        "required": ["error_description", "correction_suggestion"]
                    }
                }
            },
            "required": ["is_correct", "score", "analysis", "errors"]
        })
    }
}

/// One reviewer's grade of one answer. Scores are clamped to `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub student_id: String,
    pub reviewer: Reviewer,
    pub is_correct: bool,
    pub score: f64,
    pub analysis: String,
    pub errors: Vec<DetectedError>,
}

impl Review {
    pub(super) fn from_reply(student_id: &str, reviewer: Reviewer, reply: ReviewReply) -> Self {
        Self {
            student_id: student_id.to_string(),
            reviewer,
            is_correct: reply.is_correct,
            score: reply.score.clamp(0.0, 1.0),
            analysis: reply.analysis,
            errors: reply.errors,
        }
    }
}

/// Reviews of one answer: reviewer A, reviewer B, then the arbitrator when one was
/// needed. Failed reviews are absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReviews {
    pub student_id: String,
    pub reviews: Vec<Review>,
}

impl StudentReviews {
    fn by(&self, reviewer: Reviewer) -> Option<&Review> {
        self.reviews.iter().find(|r| r.reviewer == reviewer)
    }

    /// Both initial reviews exist and their scores are at least the threshold apart.
    pub fn disagree(&self) -> bool {
        match (self.by(Reviewer::ReviewerA), self.by(Reviewer::ReviewerB)) {
            (Some(a), Some(b)) => {
                (a.score - b.score).abs() + SCORE_EPSILON >= SCORE_DIFFERENCE_THRESHOLD
            }
            _ => false,
        }
    }

    pub fn needs_arbitration(&self) -> bool {
        self.disagree() && self.by(Reviewer::Arbitrator).is_none()
    }

    /// Final grade, or `None` when an initial review is missing.
    ///
    /// Agreeing reviewers are averaged. After arbitration the arbitrator's score is
    /// averaged with the closer reviewer (B on a tie) and its analysis is kept.
    pub fn final_grade(&self) -> Option<FinalGrade> {
        let a = self.by(Reviewer::ReviewerA)?;
        let b = self.by(Reviewer::ReviewerB)?;
        let grade = match self.by(Reviewer::Arbitrator) {
            Some(arb) => {
                let closer = if (a.score - arb.score).abs() < (b.score - arb.score).abs() {
                    a
                } else {
                    b
                };
                FinalGrade {
                    student_id: self.student_id.clone(),
                    final_score: (closer.score + arb.score) / 2.0,
                    final_analysis: arb.analysis.clone(),
                    is_controversial: true,
                }
            }
            None => FinalGrade {
                student_id: self.student_id.clone(),
                final_score: (a.score + b.score) / 2.0,
                final_analysis: format!(
                    "Combined:\n- {}: {}\n- {}: {}",
                    a.reviewer.as_str(),
                    a.analysis,
                    b.reviewer.as_str(),
                    b.analysis
                ),
                // arbitration was due but failed
                is_controversial: self.disagree(),
            },
        };
        Some(grade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalGrade {
    pub student_id: String,
    pub final_score: f64,
    pub final_analysis: String,
    /// Reviewers disagreed by at least the threshold.
    pub is_controversial: bool,
}

/// Class-level analysis of one question's answers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradingReport {
    pub common_error_patterns: Vec<String>,
    pub overall_performance_summary: String,
    pub teaching_suggestions: Vec<String>,
}

impl GradingReport {
    pub(super) fn unavailable(reason: &str) -> Self {
        Self {
            overall_performance_summary: format!("Report could not be generated: {}", reason),
            ..Default::default()
        }
    }
}

impl StructuredOutput for GradingReport {
    fn type_name() -> &'static str {
        "AggregatedReport"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "common_error_patterns": {"type": "array", "items": {"type": "string"}},
                "overall_performance_summary": {"type": "string"},
                "teaching_suggestions": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["common_error_patterns", "overall_performance_summary", "teaching_suggestions"]
        })
    }
}

/// Graph state: initial_review → arbitration? → final_scores → report.
#[derive(Debug, Clone)]
pub struct GradingState {
    pub request: GradingRequest,
    /// One entry per student answer, same order.
    pub reviews: Vec<StudentReviews>,
    pub grades: Vec<FinalGrade>,
    /// Students without both initial reviews.
    pub ungraded: Vec<String>,
    pub report: Option<GradingReport>,
}

impl GradingState {
    pub fn new(request: GradingRequest) -> Self {
        Self {
            request,
            reviews: Vec::new(),
            grades: Vec::new(),
            ungraded: Vec::new(),
            report: None,
        }
    }

    pub fn needs_arbitration(&self) -> bool {
        self.reviews.iter().any(StudentReviews::needs_arbitration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(reviewer: Reviewer, score: f64, analysis: &str) -> Review {
        Review {
            student_id: "s1".into(),
            reviewer,
            is_correct: score >= 1.0,
            score,
            analysis: analysis.into(),
            errors: Vec::new(),
        }
    }

    fn student(reviews: Vec<Review>) -> StudentReviews {
        StudentReviews {
            student_id: "s1".into(),
            reviews,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// **Scenario**: Differences of exactly 0.2 trigger arbitration despite float rounding.
    #[test]
    fn threshold_is_inclusive() {
        for (a, b) in [(0.7, 0.5), (0.8, 0.6), (0.3, 0.1)] {
            let s = student(vec![
                review(Reviewer::ReviewerA, a, "x"),
                review(Reviewer::ReviewerB, b, "y"),
            ]);
            assert!(s.needs_arbitration(), "{} vs {}", a, b);
        }
        let s = student(vec![
            review(Reviewer::ReviewerA, 0.7, "x"),
            review(Reviewer::ReviewerB, 0.55, "y"),
        ]);
        assert!(!s.needs_arbitration());
    }

    #[test]
    fn agreeing_reviewers_are_averaged() {
        let s = student(vec![
            review(Reviewer::ReviewerA, 0.8, "good"),
            review(Reviewer::ReviewerB, 0.9, "very good"),
        ]);
        let g = s.final_grade().unwrap();
        assert!(close(g.final_score, 0.85));
        assert!(!g.is_controversial);
        assert_eq!(
            g.final_analysis,
            "Combined:\n- reviewer_A: good\n- reviewer_B: very good"
        );
    }

    /// **Scenario**: The arbitrator's score is averaged with the closer reviewer.
    #[test]
    fn arbitration_uses_closer_reviewer() {
        let s = student(vec![
            review(Reviewer::ReviewerA, 0.2, "weak"),
            review(Reviewer::ReviewerB, 0.9, "strong"),
            review(Reviewer::Arbitrator, 0.8, "mostly right"),
        ]);
        assert!(!s.needs_arbitration());
        let g = s.final_grade().unwrap();
        assert!(close(g.final_score, 0.85));
        assert!(g.is_controversial);
        assert_eq!(g.final_analysis, "mostly right");
    }

    #[test]
    fn arbitration_tie_takes_reviewer_b() {
        let s = student(vec![
            review(Reviewer::ReviewerA, 0.25, "a"),
            review(Reviewer::ReviewerB, 0.75, "b"),
            review(Reviewer::Arbitrator, 0.5, "arb"),
        ]);
        assert!(close(s.final_grade().unwrap().final_score, 0.625));
    }

    #[test]
    fn failed_arbitration_is_still_controversial() {
        let s = student(vec![
            review(Reviewer::ReviewerA, 0.0, "wrong"),
            review(Reviewer::ReviewerB, 1.0, "right"),
        ]);
        let g = s.final_grade().unwrap();
        assert!(close(g.final_score, 0.5));
        assert!(g.is_controversial);
    }

    #[test]
    fn missing_initial_review_leaves_student_ungraded() {
        let s = student(vec![review(Reviewer::ReviewerB, 0.5, "half")]);
        assert!(s.final_grade().is_none());
        assert!(!s.needs_arbitration());
    }

    #[test]
    fn reply_score_is_clamped() {
        let reply = ReviewReply {
            is_correct: true,
            score: 1.4,
            analysis: "ok".into(),
            errors: Vec::new(),
        };
        let r = Review::from_reply("s9", Reviewer::ReviewerA, reply);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.student_id, "s9");
    }

    #[test]
    fn reviewer_wire_names() {
        assert_eq!(
            serde_json::to_string(&Reviewer::ReviewerA).unwrap(),
            "\"reviewer_A\""
        );
        assert_eq!(Reviewer::Arbitrator.as_str(), "arbitrator");
    }
}
