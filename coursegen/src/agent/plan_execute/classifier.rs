//! Step classifier: asks the model to split a plan into pre / parallel / post.

use crate::prompts::render;
use crate::structured::StructuredLlm;

use super::partition::{check_partition, reconcile, Partition, PartitionCheck};

/// Classifies plan steps by dependency. The result always covers the plan exactly.
pub struct StepClassifier {
    llm: StructuredLlm,
    template: String,
}

impl StepClassifier {
    pub fn new(llm: StructuredLlm, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }

    /// Empty plan → empty partition without a model call. A failed call or an
    /// unusable reply is reconciled like any other answer, which puts every
    /// step in `post`.
    pub async fn classify(&self, plan: &[String]) -> Partition {
        if plan.is_empty() {
            return Partition::default();
        }
        let listing = numbered(plan);
        let prompt = render(&self.template, &[("plan", listing.as_str())]);
        let raw = match self.llm.invoke::<Partition>(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, steps = plan.len(), "classification failed, running plan sequentially");
                Partition::default()
            }
        };
        if let PartitionCheck::Invalid(reason) = check_partition(plan, &raw) {
            tracing::debug!(reason = %reason, "reconciling classifier output");
        }
        let partition = reconcile(plan, raw);
        tracing::info!(
            pre = partition.pre.len(),
            parallel = partition.parallel.len(),
            post = partition.post.len(),
            "plan classified"
        );
        partition
    }
}

fn numbered(plan: &[String]) -> String {
    plan.iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::MockLlm;

    fn plan() -> Vec<String> {
        vec!["topic".into(), "part 1".into(), "part 2".into(), "review".into()]
    }

    #[tokio::test]
    async fn empty_plan_makes_no_model_call() {
        let mock = Arc::new(MockLlm::new("{}"));
        let c = StepClassifier::new(StructuredLlm::new(mock.clone()), "{plan}");
        assert!(c.classify(&[]).await.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn well_formed_reply_is_used_as_is() {
        let mock = Arc::new(MockLlm::new(
            r#"{"pre": ["topic"], "parallel": ["part 1", "part 2"], "post": ["review"]}"#,
        ));
        let c = StepClassifier::new(StructuredLlm::new(mock.clone()), "Steps:\n{plan}");
        let p = c.classify(&plan()).await;
        assert_eq!(p.pre, vec!["topic".to_string()]);
        assert_eq!(p.parallel.len(), 2);
        assert_eq!(p.post, vec!["review".to_string()]);
        assert!(mock.calls()[0][0].content().contains("2. part 1"));
    }

    /// **Scenario**: Garbage from the model puts every step in post, in plan order.
    #[tokio::test]
    async fn garbage_reply_degrades_to_sequential_post() {
        let c = StepClassifier::new(
            StructuredLlm::new(Arc::new(MockLlm::new("I think they are all parallel"))),
            "{plan}",
        );
        let p = c.classify(&plan()).await;
        assert!(p.pre.is_empty() && p.parallel.is_empty());
        assert_eq!(p.post, plan());
    }

    #[tokio::test]
    async fn model_failure_degrades_to_sequential_post() {
        let c = StepClassifier::new(StructuredLlm::new(Arc::new(MockLlm::failing("down"))), "{plan}");
        assert_eq!(c.classify(&plan()).await.post, plan());
    }
}
