use std::sync::Arc;

use crate::llm::LlmClient;
use crate::message::Message;

use super::{parse_structured, InvokeError, StructuredOutput};

/// Wraps an `LlmClient` with the structured-output contract.
#[derive(Clone)]
pub struct StructuredLlm {
    llm: Arc<dyn LlmClient>,
}

impl StructuredLlm {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// The wrapped client, for plain-text calls next to structured ones.
    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// Appends the output instructions for `T` to `prompt` and parses the reply.
    pub async fn invoke<T: StructuredOutput>(&self, prompt: &str) -> Result<T, InvokeError> {
        self.invoke_messages(vec![Message::user(Self::with_instructions::<T>(prompt))])
            .await
    }

    /// Same as `invoke` with a leading system message.
    pub async fn invoke_with_system<T: StructuredOutput>(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<T, InvokeError> {
        self.invoke_messages(vec![
            Message::system(system),
            Message::user(Self::with_instructions::<T>(prompt)),
        ])
        .await
    }

    async fn invoke_messages<T: StructuredOutput>(
        &self,
        messages: Vec<Message>,
    ) -> Result<T, InvokeError> {
        let response = self.llm.invoke(&messages).await?;
        let parsed = parse_structured::<T>(&response.content);
        if let Err(e) = &parsed {
            tracing::debug!(
                target_type = T::type_name(),
                error = %e,
                reply_chars = response.content.len(),
                "structured reply rejected"
            );
        }
        parsed
    }

    fn with_instructions<T: StructuredOutput>(prompt: &str) -> String {
        let schema = serde_json::to_string_pretty(&T::schema()).unwrap_or_default();
        format!(
            "{prompt}\n\nRespond with a single JSON value ({name}) that matches this JSON schema. \
             Output only the JSON, with no commentary.\n{schema}",
            name = T::type_name(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlm, MockReply};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Title {
        title: String,
    }

    impl StructuredOutput for Title {
        fn type_name() -> &'static str {
            "Title"
        }
        fn schema() -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "required": ["title"]
            })
        }
    }

    /// **Scenario**: The prompt sent to the model carries the schema; a valid reply parses.
    #[tokio::test]
    async fn invoke_appends_schema_and_parses_reply() {
        let mock = Arc::new(MockLlm::new(r#"{"title": "Sorting"}"#));
        let structured = StructuredLlm::new(mock.clone());
        let out: Title = structured.invoke("name the chapter").await.unwrap();
        assert_eq!(out.title, "Sorting");

        let calls = mock.calls();
        let sent = calls[0][0].content();
        assert!(sent.starts_with("name the chapter"));
        assert!(sent.contains("\"required\""));
        assert!(sent.contains("Title"));
    }

    #[tokio::test]
    async fn invoke_maps_model_failure_and_parse_failure() {
        let structured = StructuredLlm::new(Arc::new(MockLlm::scripted([
            MockReply::failure("503"),
            MockReply::text("not json"),
        ])));
        let err = structured.invoke::<Title>("x").await.unwrap_err();
        assert!(matches!(err, InvokeError::Model(_)));
        let err = structured.invoke::<Title>("x").await.unwrap_err();
        assert!(err.is_parse());
    }
}
