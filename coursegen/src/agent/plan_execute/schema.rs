//! Structured outputs of the plan-execute model calls.

use serde::Deserialize;
use serde_json::json;

use crate::structured::StructuredOutput;

use super::partition::Partition;

/// Planner output: `{"steps": [..]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSteps {
    pub steps: Vec<String>,
}

impl StructuredOutput for PlanSteps {
    fn type_name() -> &'static str {
        "Plan"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "steps": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Ordered steps for producing the lesson plan; each one concrete and self-contained."
                }
            },
            "required": ["steps"]
        })
    }
}

impl StructuredOutput for Partition {
    fn type_name() -> &'static str {
        "Classification"
    }

    fn schema() -> serde_json::Value {
        let lane = |description: &str| {
            json!({"type": "array", "items": {"type": "string"}, "description": description})
        };
        json!({
            "type": "object",
            "properties": {
                "pre": lane("Steps that must finish before the parallel group."),
                "parallel": lane("Steps that can run concurrently."),
                "post": lane("Steps that must run after the parallel group.")
            },
            "required": ["pre", "parallel", "post"]
        })
    }
}

/// Replanner output: either a final response or more steps.
///
/// Wire form: `{"action": {"response": ".."}}` or `{"action": {"steps": [..]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ReplanEnvelope")]
pub enum ReplanDecision {
    Respond(String),
    Continue(Vec<String>),
}

#[derive(Deserialize)]
struct ReplanEnvelope {
    action: ReplanAction,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplanAction {
    Respond { response: String },
    Continue { steps: Vec<String> },
}

impl From<ReplanEnvelope> for ReplanDecision {
    fn from(envelope: ReplanEnvelope) -> Self {
        match envelope.action {
            ReplanAction::Respond { response } => ReplanDecision::Respond(response),
            ReplanAction::Continue { steps } => ReplanDecision::Continue(steps),
        }
    }
}

impl StructuredOutput for ReplanDecision {
    fn type_name() -> &'static str {
        "Act"
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "oneOf": [
                        {
                            "type": "object",
                            "properties": {"response": {"type": "string"}},
                            "required": ["response"]
                        },
                        {
                            "type": "object",
                            "properties": {"steps": {"type": "array", "items": {"type": "string"}}},
                            "required": ["steps"]
                        }
                    ]
                }
            },
            "required": ["action"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::parse_structured;

    #[test]
    fn replan_decision_parses_both_variants() {
        let d: ReplanDecision = parse_structured(r#"{"action": {"response": "done"}}"#).unwrap();
        assert_eq!(d, ReplanDecision::Respond("done".into()));
        let d: ReplanDecision =
            parse_structured(r#"{"action": {"steps": ["x", "y"]}}"#).unwrap();
        assert_eq!(d, ReplanDecision::Continue(vec!["x".into(), "y".into()]));
    }

    #[test]
    fn replan_decision_rejects_missing_action() {
        assert!(parse_structured::<ReplanDecision>(r#"{"response": "done"}"#).is_err());
        assert!(parse_structured::<ReplanDecision>(r#"{"action": {"other": 1}}"#).is_err());
    }

    #[test]
    fn partition_lanes_default_when_absent() {
        let p: Partition = parse_structured(r#"{"parallel": ["a"]}"#).unwrap();
        assert!(p.pre.is_empty());
        assert_eq!(p.parallel, vec!["a".to_string()]);
    }
}
