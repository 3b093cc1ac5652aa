//! Quiz workflow state and the structured outputs of its model calls.
//!
//! Field names on the wire are camelCase (`questionType`, `knowledgePoints`, ...),
//! the shape the quiz store expects.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::structured::StructuredOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::ShortAnswer => "short_answer",
        }
    }

    pub fn is_choice(self) -> bool {
        !matches!(self, QuestionType::ShortAnswer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// What one question should be: type, covered knowledge points, difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionForm {
    pub question_type: QuestionType,
    /// Comma-separated knowledge points.
    pub knowledge_points: String,
    pub difficulty: Difficulty,
}

impl QuestionForm {
    /// Plain-text form used in the question prompt.
    pub fn describe(&self) -> String {
        format!(
            "type: {}\nknowledge points: {}\ndifficulty: {}",
            self.question_type.as_str(),
            self.knowledge_points.trim(),
            self.difficulty.as_str()
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct QuizPlan {
    #[serde(alias = "QuizPlan")]
    pub questions: Vec<QuestionForm>,
}

impl StructuredOutput for QuizPlan {
    fn type_name() -> &'static str {
        "QuizPlan"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "questionType": {"type": "string", "enum": ["single_choice", "multiple_choice", "short_answer"]},
                            "knowledgePoints": {"type": "string", "description": "Comma-separated knowledge points"},
                            "difficulty": {"type": "string", "enum": ["easy", "medium", "hard"]}
                        },
                        "required": ["questionType", "knowledgePoints", "difficulty"]
                    }
                }
            },
            "required": ["questions"]
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub option_label: String,
    pub option_text: String,
    pub is_correct: bool,
}

/// A generated question, or a placeholder when generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_type: QuestionType,
    pub question_text: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub options: Vec<QuizOption>,
    /// Option labels for choice questions ("A" or "A,C"), a reference answer otherwise.
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub answer_explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Question {
    pub(super) fn failed(form: &QuestionForm, error: &str) -> Self {
        Self {
            question_type: form.question_type,
            question_text: format!("(failed) Question on {}", form.knowledge_points.trim()),
            difficulty: form.difficulty,
            options: Vec::new(),
            correct_answer: String::new(),
            answer_explanation: String::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }

    /// Checks the question against its declared type.
    pub fn validate(&self) -> Result<(), String> {
        if self.question_text.trim().is_empty() {
            return Err("empty question text".to_string());
        }
        if !self.question_type.is_choice() {
            return Ok(());
        }
        if self.options.is_empty() {
            return Err("choice question without options".to_string());
        }
        let correct = self.options.iter().filter(|o| o.is_correct).count();
        match (self.question_type, correct) {
            (_, 0) => Err("no option marked correct".to_string()),
            (QuestionType::SingleChoice, n) if n > 1 => {
                Err(format!("single-choice question with {} correct options", n))
            }
            _ => Ok(()),
        }
    }

    pub fn to_markdown(&self, number: usize) -> String {
        let mut out = format!(
            "### {}. [{} / {}] {}\n",
            number,
            self.question_type.as_str(),
            self.difficulty.as_str(),
            self.question_text
        );
        if let Some(error) = &self.error {
            out.push_str(&format!("\n> This question could not be generated: {}", error));
            return out;
        }
        for o in &self.options {
            out.push_str(&format!("- {}. {}\n", o.option_label, o.option_text));
        }
        out.push_str(&format!("\n**Answer**: {}\n", self.correct_answer));
        if !self.answer_explanation.trim().is_empty() {
            out.push_str(&format!("\n*{}*", self.answer_explanation.trim()));
        }
        out
    }
}

impl StructuredOutput for Question {
    fn type_name() -> &'static str {
        "Question"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "questionType": {"type": "string", "enum": ["single_choice", "multiple_choice", "short_answer"]},
                "questionText": {"type": "string"},
                "difficulty": {"type": "string", "enum": ["easy", "medium", "hard"]},
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "optionLabel": {"type": "string"},
                            "optionText": {"type": "string"},
                            "isCorrect": {"type": "boolean"}
                        },
                        "required": ["optionLabel", "optionText", "isCorrect"]
                    }
                },
                "correctAnswer": {"type": "string"},
                "answerExplanation": {"type": "string"}
            },
            "required": ["questionType", "questionText", "difficulty", "options", "correctAnswer", "answerExplanation"]
        })
    }
}

/// Plan split by question type; each group keeps plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionGroups {
    pub single_choice: Vec<QuestionForm>,
    pub multiple_choice: Vec<QuestionForm>,
    pub short_answer: Vec<QuestionForm>,
}

impl QuestionGroups {
    pub fn from_plan(plan: &[QuestionForm]) -> Self {
        let mut groups = Self::default();
        for form in plan {
            let group = match form.question_type {
                QuestionType::SingleChoice => &mut groups.single_choice,
                QuestionType::MultipleChoice => &mut groups.multiple_choice,
                QuestionType::ShortAnswer => &mut groups.short_answer,
            };
            group.push(form.clone());
        }
        groups
    }

    /// Single choice, then multiple choice, then short answer.
    pub fn ordered(&self) -> Vec<QuestionForm> {
        self.single_choice
            .iter()
            .chain(&self.multiple_choice)
            .chain(&self.short_answer)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.single_choice.len() + self.multiple_choice.len() + self.short_answer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Graph state: plan → classify → generate.
#[derive(Debug, Clone, Default)]
pub struct QuizState {
    pub requirements: String,
    pub plan: Vec<QuestionForm>,
    pub groups: QuestionGroups,
    pub questions: Vec<Question>,
}
