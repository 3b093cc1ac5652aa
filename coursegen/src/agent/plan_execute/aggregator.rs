//! Aggregator: turns execution records into the final document.

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::message::Message;
use crate::prompts::render;

use super::state::ExecutionRecord;

/// Heading placed above the raw draft when polishing fails.
pub const FALLBACK_HEADING: &str = "# Lesson plan (fallback)";

/// Document produced when there is nothing to aggregate.
pub const FAILED_GRACEFULLY: &str =
    "# Lesson plan\n\n> Generation failed gracefully: no content could be produced for this goal.";

/// Details in insertion order, separated by a blank line.
pub fn concatenate(records: &[ExecutionRecord]) -> String {
    records
        .iter()
        .map(|r| r.detail.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Asks `llm` to rewrite `draft` with `template` (`{draft}` placeholder).
///
/// A failed or empty reply yields `draft` under `heading`.
pub async fn polish_with_fallback(
    llm: &dyn LlmClient,
    template: &str,
    draft: &str,
    heading: &str,
) -> String {
    let prompt = render(template, &[("draft", draft)]);
    match llm.invoke(&[Message::user(prompt)]).await {
        Ok(reply) if !reply.content.trim().is_empty() => reply.content.trim().to_string(),
        Ok(_) => {
            tracing::warn!("polish returned nothing, emitting raw draft");
            format!("{}\n\n{}", heading, draft)
        }
        Err(e) => {
            tracing::warn!(error = %e, "polish failed, emitting raw draft");
            format!("{}\n\n{}", heading, draft)
        }
    }
}

/// Concatenates records, optionally followed by a polishing pass.
pub struct Aggregator {
    writer: Option<(Arc<dyn LlmClient>, String)>,
}

impl Aggregator {
    /// Plain concatenation.
    pub fn new() -> Self {
        Self { writer: None }
    }

    pub fn with_polish(writer: Arc<dyn LlmClient>, template: impl Into<String>) -> Self {
        Self {
            writer: Some((writer, template.into())),
        }
    }

    pub async fn aggregate(&self, records: &[ExecutionRecord]) -> String {
        if records.is_empty() {
            tracing::warn!("no execution records, emitting failed-gracefully document");
            return FAILED_GRACEFULLY.to_string();
        }
        let draft = concatenate(records);
        match &self.writer {
            Some((llm, template)) => {
                polish_with_fallback(llm.as_ref(), template, &draft, FALLBACK_HEADING).await
            }
            None => draft,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn records() -> Vec<ExecutionRecord> {
        vec![
            ExecutionRecord::completed("a", "### A\nalpha\n", "sa"),
            ExecutionRecord::failed("b", "quota"),
            ExecutionRecord::completed("c", "### C\ngamma", "sc"),
        ]
    }

    #[tokio::test]
    async fn empty_records_fail_gracefully() {
        let doc = Aggregator::new().aggregate(&[]).await;
        assert!(doc.contains("failed gracefully"));
    }

    /// **Scenario**: Failed placeholders stay in place between completed details.
    #[tokio::test]
    async fn concatenation_keeps_insertion_order() {
        let doc = Aggregator::default().aggregate(&records()).await;
        let a = doc.find("alpha").unwrap();
        let b = doc.find("could not be generated: quota").unwrap();
        let c = doc.find("gamma").unwrap();
        assert!(a < b && b < c);
        assert!(doc.contains("alpha\n\n### b"));
    }

    #[tokio::test]
    async fn polish_replaces_draft() {
        let writer = Arc::new(MockLlm::new("# Binary search\n\nPolished."));
        let doc = Aggregator::with_polish(writer.clone(), "Edit:\n{draft}")
            .aggregate(&records())
            .await;
        assert_eq!(doc, "# Binary search\n\nPolished.");
        assert!(writer.calls()[0][0].content().contains("gamma"));
    }

    #[tokio::test]
    async fn polish_failure_falls_back_to_draft() {
        let writer = Arc::new(MockLlm::failing("writer down"));
        let doc = Aggregator::with_polish(writer, "{draft}")
            .aggregate(&records())
            .await;
        assert!(doc.starts_with(FALLBACK_HEADING));
        assert!(doc.contains("gamma"));
    }

    #[tokio::test]
    async fn empty_polish_reply_falls_back() {
        let writer = MockLlm::new("   ");
        let doc = polish_with_fallback(&writer, "{draft}", "draft body", "# Heading").await;
        assert_eq!(doc, "# Heading\n\ndraft body");
    }
}
