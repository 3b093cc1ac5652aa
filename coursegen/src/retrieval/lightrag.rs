//! HTTP client for a LightRAG server (`POST {base}/query`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{RetrievalError, RetrievalMode, Retriever};

/// Default LightRAG endpoint when `RAG_URL` is not configured.
pub const DEFAULT_RAG_URL: &str = "http://localhost:9621";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOP_K: u32 = 10;
const MAX_CONTEXT_TOKENS: u32 = 4000;

/// LightRAG retriever. One `reqwest::Client` is reused for all queries.
pub struct LightRagRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl LightRagRetriever {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    pub(crate) fn build_body(query: &str, mode: RetrievalMode) -> serde_json::Value {
        json!({
            "mode": mode.as_str(),
            "query": query,
            "stream": false,
            "response_type": "Multiple Paragraphs",
            "top_k": TOP_K,
            "max_token_for_text_unit": MAX_CONTEXT_TOKENS,
            "max_token_for_global_context": MAX_CONTEXT_TOKENS,
            "max_token_for_local_context": MAX_CONTEXT_TOKENS,
            "only_need_context": false,
            "only_need_prompt": false,
        })
    }
}

/// LightRAG answers `{"response": "..."}`; anything else is passed through as text.
fn extract_answer(body: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(v) => match v.get("response").and_then(|r| r.as_str()) {
            Some(answer) => answer.to_string(),
            None => body,
        },
        Err(_) => body,
    }
}

#[async_trait]
impl Retriever for LightRagRetriever {
    async fn retrieve(&self, query: &str, mode: RetrievalMode) -> Result<String, RetrievalError> {
        let url = self.query_url();
        tracing::debug!(url = %url, mode = %mode, query_chars = query.len(), "rag query");
        let res = self
            .client
            .post(&url)
            .json(&Self::build_body(query, mode))
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(extract_answer(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_body_matches_lightrag_query_contract() {
        let body = LightRagRetriever::build_body("what is a heap", RetrievalMode::Hybrid);
        assert_eq!(body["mode"], "hybrid");
        assert_eq!(body["query"], "what is a heap");
        assert_eq!(body["stream"], false);
        assert_eq!(body["response_type"], "Multiple Paragraphs");
        assert_eq!(body["top_k"], 10);
        assert_eq!(body["max_token_for_local_context"], 4000);
        assert_eq!(body["only_need_prompt"], false);
    }

    #[test]
    fn query_url_trims_trailing_slash() {
        let r = LightRagRetriever::new("http://rag.local:9621/").unwrap();
        assert_eq!(r.query_url(), "http://rag.local:9621/query");
    }

    #[test]
    fn extract_answer_prefers_response_field() {
        assert_eq!(extract_answer(r#"{"response":"heaps are trees"}"#.into()), "heaps are trees");
        assert_eq!(extract_answer("plain text".into()), "plain text");
        assert_eq!(extract_answer(r#"{"other":1}"#.into()), r#"{"other":1}"#);
    }

    /// **Scenario**: Nothing listening on the port maps to a transport error, not a panic.
    #[tokio::test]
    async fn retrieve_against_closed_port_is_transport_error() {
        let r = LightRagRetriever::new("http://127.0.0.1:9").unwrap();
        match r.retrieve("q", RetrievalMode::Mix).await {
            Err(RetrievalError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
