use super::{InvokeError, StructuredOutput};

/// Removes one enclosing markdown code fence (```` ``` ```` or ```` ```json ````).
///
/// Input is expected to be trimmed. Text without a complete enclosing fence is
/// returned unchanged.
pub fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return raw;
    };
    // drop the info string (e.g. "json") up to the first newline
    match body.find('\n') {
        Some(pos) => body[pos + 1..].trim(),
        None => body.trim(),
    }
}

/// Strict parse of a model reply into `T`.
pub fn parse_structured<T: StructuredOutput>(raw: &str) -> Result<T, InvokeError> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str::<T>(body).map_err(|e| InvokeError::Parse {
        type_name: T::type_name(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Steps {
        steps: Vec<String>,
    }

    impl StructuredOutput for Steps {
        fn type_name() -> &'static str {
            "Steps"
        }
        fn schema() -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
    }

    #[test]
    fn strip_code_fence_with_language_tag() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
    }

    #[test]
    fn strip_code_fence_leaves_unfenced_or_unbalanced_text() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }

    /// **Scenario**: A fenced reply surrounded by whitespace parses.
    #[test]
    fn parse_structured_accepts_fenced_json() {
        let parsed: Steps =
            parse_structured("\n  ```json\n{\"steps\": [\"a\", \"b\"]}\n```  \n").unwrap();
        assert_eq!(parsed.steps, vec!["a".to_string(), "b".to_string()]);
    }

    /// **Scenario**: Prose around the JSON is not tolerated.
    #[test]
    fn parse_structured_rejects_prose_and_wrong_shape() {
        let err = parse_structured::<Steps>("Sure! {\"steps\": []}").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("Steps"));

        let err = parse_structured::<Steps>("{\"steps\": \"not a list\"}").unwrap_err();
        assert!(err.is_parse());
    }
}
