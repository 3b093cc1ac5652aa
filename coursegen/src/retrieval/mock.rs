use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RetrievalError, RetrievalMode, Retriever};

/// Canned retriever: answers by substring match on the query, else a default or an error.
#[derive(Default)]
pub struct MockRetriever {
    answers: HashMap<String, String>,
    default_answer: Option<String>,
    queries: Mutex<Vec<(String, RetrievalMode)>>,
}

impl MockRetriever {
    /// Always answers `answer`.
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            default_answer: Some(answer.into()),
            ..Self::default()
        }
    }

    /// Fails every query with a transport error.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, needle: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(needle.into(), answer.into());
        self
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<(String, RetrievalMode)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn retrieve(&self, query: &str, mode: RetrievalMode) -> Result<String, RetrievalError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push((query.to_string(), mode));
        }
        self.answers
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, answer)| answer.clone())
            .or_else(|| self.default_answer.clone())
            .ok_or_else(|| RetrievalError::Transport("knowledge base unavailable".to_string()))
    }
}
