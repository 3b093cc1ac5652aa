//! Syllabus workflow state and the structured outputs of its model calls.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::structured::StructuredOutput;

/// One chapter parsed from the syllabus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(alias = "chapter_title")]
    pub title: String,
    #[serde(default)]
    pub knowledge_points: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct SyllabusStructure {
    pub chapters: Vec<Chapter>,
}

impl StructuredOutput for SyllabusStructure {
    fn type_name() -> &'static str {
        "SyllabusStructure"
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
                            "title": {"type": "string"},
                            "knowledge_points": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["title", "knowledge_points"]
                    }
                }
            },
            "required": ["chapters"]
        })
    }
}

/// One explanation per knowledge point, same order.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub(super) struct Explanations(pub Vec<String>);

impl StructuredOutput for Explanations {
    fn type_name() -> &'static str {
        "Explanations"
    }

    fn schema() -> serde_json::Value {
        json!({"type": "array", "items": {"type": "string"}})
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub minutes: u32,
}

/// Suggested split of class time for a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeAllocation {
    pub activities: Vec<Activity>,
    pub rationale: String,
}

impl TimeAllocation {
    pub(super) fn failed() -> Self {
        Self {
            activities: vec![Activity {
                name: "error".to_string(),
                minutes: 0,
            }],
            rationale: "Time allocation could not be generated.".to_string(),
        }
    }
}

impl StructuredOutput for TimeAllocation {
    fn type_name() -> &'static str {
        "TimeAllocation"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "activities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "Activity, e.g. lecture, live coding, discussion"},
                            "minutes": {"type": "integer", "description": "Suggested minutes"}
                        },
                        "required": ["name", "minutes"]
                    }
                },
                "rationale": {"type": "string", "description": "Short reason for this split"}
            },
            "required": ["activities", "rationale"]
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeExplanation {
    pub knowledge_point: String,
    pub explanation: String,
}

/// Generated content for one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterResult {
    pub title: String,
    pub knowledge: Vec<KnowledgeExplanation>,
    pub time_allocation: TimeAllocation,
    /// Set on placeholders for chapters whose generation failed as a whole.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChapterResult {
    pub(super) fn failed(chapter: &Chapter, error: &str) -> Self {
        Self {
            title: format!("{} (failed)", chapter.title),
            knowledge: Vec::new(),
            time_allocation: TimeAllocation::default(),
            error: Some(error.to_string()),
        }
    }

    /// Markdown section of the draft.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## {}\n\n", self.title);
        if let Some(error) = &self.error {
            out.push_str(&format!("> This chapter could not be generated: {}", error));
            return out;
        }
        out.push_str("### Knowledge points\n");
        for k in &self.knowledge {
            out.push_str(&format!("- **{}**: {}\n", k.knowledge_point, k.explanation));
        }
        out.push_str("\n### Time allocation\n");
        for a in &self.time_allocation.activities {
            out.push_str(&format!("- {}: {} minutes\n", a.name, a.minutes));
        }
        out.push_str(&format!("*Rationale: {}*", self.time_allocation.rationale));
        out
    }
}

/// Graph state: parse → generate_chapters → finalize.
#[derive(Debug, Clone, Default)]
pub struct SyllabusState {
    pub syllabus: String,
    pub chapters: Vec<Chapter>,
    pub results: Vec<ChapterResult>,
    pub document: Option<String>,
}
