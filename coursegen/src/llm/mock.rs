//! Mock LLM for tests and offline demos.
//!
//! Replies are chosen in this order: the first *route* whose needle appears in the
//! last message, then the next *scripted* reply, then the fixed default reply.
//! Every reply can carry an artificial delay or fail instead of answering, which
//! lets tests reorder concurrent completions and inject model failures.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::llm::{LlmClient, LlmResponse};
use crate::message::Message;

/// One canned reply: text or failure, after an optional delay.
#[derive(Clone, Debug)]
pub struct MockReply {
    outcome: Result<String, String>,
    delay: Duration,
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            outcome: Ok(content.into()),
            delay: Duration::ZERO,
        }
    }

    /// Reply with `AgentError::ExecutionFailed(message)`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Sleep for `delay` before answering.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scripted LLM: routes, a FIFO script and a fallback reply.
///
/// Records every prompt it receives; see `calls` and `call_count`.
pub struct MockLlm {
    default_reply: Option<MockReply>,
    script: Mutex<VecDeque<MockReply>>,
    routes: Vec<(String, MockReply)>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlm {
    /// Always answers `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            default_reply: Some(MockReply::text(content)),
            ..Self::empty()
        }
    }

    /// Answers the given replies in order; fails once they run out.
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::empty()
        }
    }

    /// Fails every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            default_reply: Some(MockReply::failure(message)),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            default_reply: None,
            script: Mutex::new(VecDeque::new()),
            routes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// When the last message contains `needle`, answer `reply` (routes are checked in insertion order).
    pub fn with_route(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.routes.push((needle.into(), reply));
        self
    }

    /// Fallback when no route matches and the script is exhausted.
    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    /// Number of `invoke` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Prompts received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn pick(&self, messages: &[Message]) -> Option<MockReply> {
        let last = messages.last().map(Message::content).unwrap_or_default();
        if let Some((_, reply)) = self.routes.iter().find(|(needle, _)| last.contains(needle)) {
            return Some(reply.clone());
        }
        if let Some(reply) = self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            return Some(reply);
        }
        self.default_reply.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let reply = self.pick(messages).ok_or_else(|| {
            AgentError::ExecutionFailed("mock llm has no reply left".to_string())
        })?;
        if reply.delay > Duration::ZERO {
            tokio::time::sleep(reply.delay).await;
        }
        match reply.outcome {
            Ok(content) => Ok(LlmResponse {
                content,
                usage: None,
            }),
            Err(message) => Err(AgentError::ExecutionFailed(message)),
        }
    }
}
