//! LLM client abstraction used by every model-backed stage.
//!
//! Stages only need "messages in, assistant text out"; structured stages wrap a
//! client in `structured::StructuredLlm`. Implementations: `MockLlm` (scripted,
//! for tests) and `ChatOpenAI` (OpenAI-compatible Chat Completions).

mod mock;
mod openai;

pub use mock::{MockLlm, MockReply};
pub use openai::ChatOpenAI;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::Message;

/// Token usage for one LLM call (prompt + completion).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an LLM completion.
#[derive(Clone, Debug)]
pub struct LlmResponse {
    /// Assistant message content (plain text).
    pub content: String,
    /// Token usage for this call, when the backend reports it.
    pub usage: Option<LlmUsage>,
}

/// LLM client: given messages, returns the assistant reply.
///
/// Implementations must be shareable across concurrently executing steps.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages, return assistant content.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError> {
            Ok(LlmResponse {
                content: messages
                    .last()
                    .map(|m| m.content().to_string())
                    .unwrap_or_default(),
                usage: None,
            })
        }
    }

    /// **Scenario**: A trait object can be shared and invoked behind Arc.
    #[tokio::test]
    async fn llm_client_is_object_safe_and_shareable() {
        let llm: std::sync::Arc<dyn LlmClient> = std::sync::Arc::new(EchoLlm);
        let resp = llm.invoke(&[Message::user("ping")]).await.unwrap();
        assert_eq!(resp.content, "ping");
        assert!(resp.usage.is_none());
    }
}
