//! Integration tests: plan-execute-replan runner end to end with scripted models.


use std::sync::Arc;
use std::time::Duration;

use coursegen::agent::plan_execute::{RecordStatus, FAILED_GRACEFULLY, FALLBACK_HEADING};
use coursegen::prompts::default_from_embedded;
use coursegen::{
    ExecutionMode, MockLlm, MockReply, MockRetriever, PlanExecuteConfig, PlanExecuteModels,
    PlanExecuteRunner, RetrievalMode,
};

const LESSON_PLANNER: &str = "senior lesson-plan designer";
const EXPERIMENT_PLANNER: &str = "senior designer of hands-on lab";
const CLASSIFIER: &str = "You classify lesson-plan steps";
const REPLANNER: &str = "You are re-planning";

const BINARY_SEARCH_PLAN: &str =
    r#"{"steps": ["Introduce binary search", "Explain the idea", "Summarize complexity"]}"#;
const BINARY_SEARCH_LANES: &str = r#"{"pre": [], "parallel": ["Introduce binary search", "Explain the idea"], "post": ["Summarize complexity"]}"#;
const DONE: &str = r#"{"action": {"response": "The lesson plan is complete."}}"#;

struct Models {
    planner: Arc<MockLlm>,
    executor: Arc<MockLlm>,
    summarizer: Arc<MockLlm>,
    writer: Arc<MockLlm>,
}

impl Models {
    fn new(planner: MockLlm, executor: MockLlm) -> Self {
        Self {
            planner: Arc::new(planner),
            executor: Arc::new(executor),
            summarizer: Arc::new(MockLlm::new("one-line summary")),
            writer: Arc::new(MockLlm::new("# Polished lesson plan")),
        }
    }

    fn roles(&self) -> PlanExecuteModels {
        PlanExecuteModels {
            planner: self.planner.clone(),
            executor: self.executor.clone(),
            summarizer: self.summarizer.clone(),
            writer: self.writer.clone(),
        }
    }
}

fn runner(models: &Models, config: PlanExecuteConfig) -> PlanExecuteRunner {
    PlanExecuteRunner::new(models.roles(), None, &default_from_embedded(), config)
        .expect("valid graph")
}

fn binary_search_executor() -> MockLlm {
    MockLlm::new("### Extra\nextra content")
        .with_route(
            "Your task: Introduce binary search",
            MockReply::text("### Introduce binary search\nSearching a sorted array.")
                .after(Duration::from_millis(80)),
        )
        .with_route(
            "Your task: Explain the idea",
            MockReply::text("### Explain the idea\nHalve the interval each time.")
                .after(Duration::from_millis(10)),
        )
        .with_route(
            "Your task: Summarize complexity",
            MockReply::text("### Summarize complexity\nO(log n) comparisons."),
        )
}

/// **Scenario**: "Teach binary search" yields the three details in plan order, with
/// "Summarize complexity" last even though the parallel steps finish out of order.
#[tokio::test]
async fn binary_search_lesson_end_to_end() {
    let planner = MockLlm::new("unused")
        .with_route(LESSON_PLANNER, MockReply::text(BINARY_SEARCH_PLAN))
        .with_route(CLASSIFIER, MockReply::text(BINARY_SEARCH_LANES))
        .with_route(REPLANNER, MockReply::text(DONE));
    let models = Models::new(planner, binary_search_executor());
    let outcome = runner(&models, PlanExecuteConfig::default())
        .run("Teach binary search")
        .await
        .unwrap();

    let steps: Vec<&str> = outcome.records.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(
        steps,
        vec!["Introduce binary search", "Explain the idea", "Summarize complexity"]
    );
    let doc = &outcome.document;
    let intro = doc.find("Searching a sorted array.").unwrap();
    let idea = doc.find("Halve the interval").unwrap();
    let summary = doc.find("O(log n) comparisons.").unwrap();
    assert!(intro < idea && idea < summary);
    assert!(doc.trim_end().ends_with("O(log n) comparisons."));
    assert_eq!(outcome.response.as_deref(), Some("The lesson plan is complete."));
    assert_eq!(outcome.cycles, 1);
    assert_eq!(models.executor.call_count(), 3);
}

/// **Scenario**: The post step's prompt carries summaries of both parallel steps.
#[tokio::test]
async fn post_step_sees_history_of_parallel_steps() {
    let planner = MockLlm::new("unused")
        .with_route(LESSON_PLANNER, MockReply::text(BINARY_SEARCH_PLAN))
        .with_route(CLASSIFIER, MockReply::text(BINARY_SEARCH_LANES))
        .with_route(REPLANNER, MockReply::text(DONE));
    let models = Models::new(planner, binary_search_executor());
    runner(&models, PlanExecuteConfig::default())
        .run("Teach binary search")
        .await
        .unwrap();

    let calls = models.executor.calls();
    let post = calls
        .iter()
        .map(|c| c[1].content().to_string())
        .find(|p| p.contains("Your task: Summarize complexity"))
        .unwrap();
    assert!(post.contains("- Introduce binary search: one-line summary"));
    assert!(post.contains("- Explain the idea: one-line summary"));
}

/// **Scenario**: An unparseable plan gives an empty plan, zero executor calls and the
/// failed-gracefully document instead of an error.
#[tokio::test]
async fn unparseable_plan_fails_gracefully() {
    let planner = MockLlm::new("Sure! Here is the plan: step one, step two.");
    let models = Models::new(planner, MockLlm::new("never"));
    let outcome = runner(&models, PlanExecuteConfig::default())
        .run("Teach binary search")
        .await
        .unwrap();

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.document, FAILED_GRACEFULLY);
    assert_eq!(models.executor.call_count(), 0);
    assert_eq!(models.planner.call_count(), 1);
}

/// **Scenario**: One parallel step fails; its sibling's content still reaches the document.
#[tokio::test]
async fn parallel_failure_degrades_to_placeholder() {
    let planner = MockLlm::new("unused")
        .with_route(LESSON_PLANNER, MockReply::text(BINARY_SEARCH_PLAN))
        .with_route(CLASSIFIER, MockReply::text(BINARY_SEARCH_LANES))
        .with_route(REPLANNER, MockReply::text(DONE));
    let executor = MockLlm::new("### Other\nother content")
        .with_route("Your task: Explain the idea", MockReply::failure("rate limited"))
        .with_route(
            "Your task: Introduce binary search",
            MockReply::text("### Intro\nSearching a sorted array."),
        );
    let models = Models::new(planner, executor);
    let outcome = runner(&models, PlanExecuteConfig::default())
        .run("Teach binary search")
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[1].status, RecordStatus::Failed);
    assert!(outcome.document.contains("Searching a sorted array."));
    assert!(outcome.document.contains("could not be generated"));
}

/// **Scenario**: A classifier that drops steps still gets every step executed exactly once.
#[tokio::test]
async fn lossy_classification_runs_every_step_once() {
    let planner = MockLlm::new("unused")
        .with_route(LESSON_PLANNER, MockReply::text(BINARY_SEARCH_PLAN))
        .with_route(
            CLASSIFIER,
            MockReply::text(r#"{"pre": [], "parallel": ["Explain the idea", "Made-up step"], "post": []}"#),
        )
        .with_route(REPLANNER, MockReply::text(DONE));
    let models = Models::new(planner, binary_search_executor());
    let outcome = runner(&models, PlanExecuteConfig::default())
        .run("Teach binary search")
        .await
        .unwrap();

    let steps: Vec<&str> = outcome.records.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(
        steps,
        vec!["Explain the idea", "Introduce binary search", "Summarize complexity"]
    );
}

/// **Scenario**: Sequential mode; the replanner keeps proposing completed steps, which are
/// never executed again.
#[tokio::test]
async fn replanning_never_reintroduces_completed_steps() {
    let planner = MockLlm::scripted([
        MockReply::text(r#"{"action": {"steps": ["A", "C"]}}"#),
        MockReply::text(r#"{"action": {"steps": ["B", "C"]}}"#),
        MockReply::text(r#"{"action": {"steps": ["A", "B", "C"]}}"#),
    ])
    .with_route(EXPERIMENT_PLANNER, MockReply::text(r#"{"steps": ["A", "B"]}"#));
    let executor = MockLlm::new("unused")
        .with_route("Your task: A", MockReply::text("detail A"))
        .with_route("Your task: B", MockReply::text("detail B"))
        .with_route("Your task: C", MockReply::text("detail C"));
    let models = Models::new(planner, executor);
    let config = PlanExecuteConfig {
        mode: ExecutionMode::Sequential,
        ..Default::default()
    };
    let outcome = runner(&models, config).run("Lab: sorting").await.unwrap();

    let steps: Vec<&str> = outcome.records.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(steps, vec!["A", "B", "C"]);
    assert_eq!(outcome.document, "detail A\n\ndetail B\n\ndetail C");
    assert!(outcome.response.is_none());
    assert_eq!(models.executor.call_count(), 3);
}

/// **Scenario**: The cycle limit ends a replanner that never stops adding steps.
#[tokio::test]
async fn max_cycles_bounds_the_loop() {
    let planner = MockLlm::new(r#"{"action": {"steps": ["More practice"]}}"#)
        .with_route(EXPERIMENT_PLANNER, MockReply::text(r#"{"steps": ["Setup"]}"#));
    let executor = MockLlm::new("detail");
    let models = Models::new(planner, executor);
    let config = PlanExecuteConfig {
        mode: ExecutionMode::Sequential,
        max_cycles: 1,
        ..Default::default()
    };
    let outcome = runner(&models, config).run("Lab").await.unwrap();

    assert_eq!(outcome.cycles, 1);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(models.planner.call_count(), 2);
}

#[tokio::test]
async fn polish_failure_emits_fallback_document() {
    let planner = MockLlm::new("unused")
        .with_route(LESSON_PLANNER, MockReply::text(BINARY_SEARCH_PLAN))
        .with_route(CLASSIFIER, MockReply::text(BINARY_SEARCH_LANES))
        .with_route(REPLANNER, MockReply::text(DONE));
    let mut models = Models::new(planner, binary_search_executor());
    models.writer = Arc::new(MockLlm::failing("writer unavailable"));
    let config = PlanExecuteConfig {
        polish: true,
        ..Default::default()
    };
    let outcome = runner(&models, config).run("Teach binary search").await.unwrap();
    assert!(outcome.document.starts_with(FALLBACK_HEADING));
    assert!(outcome.document.contains("O(log n) comparisons."));
}

#[tokio::test]
async fn polish_success_replaces_draft() {
    let planner = MockLlm::new("unused")
        .with_route(LESSON_PLANNER, MockReply::text(BINARY_SEARCH_PLAN))
        .with_route(CLASSIFIER, MockReply::text(BINARY_SEARCH_LANES))
        .with_route(REPLANNER, MockReply::text(DONE));
    let models = Models::new(planner, binary_search_executor());
    let config = PlanExecuteConfig {
        polish: true,
        verbose: true,
        ..Default::default()
    };
    let outcome = runner(&models, config).run("Teach binary search").await.unwrap();
    assert_eq!(outcome.document, "# Polished lesson plan");
    assert_eq!(outcome.records.len(), 3);
}

/// **Scenario**: Retrieved context reaches the step prompt; an unavailable service does not stop the run.
#[tokio::test]
async fn retrieval_context_and_outage() {
    let plan = r#"{"steps": ["Explain the idea"]}"#;
    for (retriever, has_context) in [
        (MockRetriever::new("KB: binary search halves"), true),
        (MockRetriever::unavailable(), false),
    ] {
        let planner = MockLlm::new("unused")
            .with_route(LESSON_PLANNER, MockReply::text(plan))
            .with_route(CLASSIFIER, MockReply::text(r#"{"pre": ["Explain the idea"], "parallel": [], "post": []}"#))
            .with_route(REPLANNER, MockReply::text(DONE));
        let models = Models::new(planner, MockLlm::new("### Idea\nhalving"));
        let config = PlanExecuteConfig {
            retrieval_mode: RetrievalMode::Local,
            ..Default::default()
        };
        let runner = PlanExecuteRunner::new(
            models.roles(),
            Some(Arc::new(retriever)),
            &default_from_embedded(),
            config,
        )
        .unwrap();
        let outcome = runner.run("Teach binary search").await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records[0].is_completed());
        let prompt = models.executor.calls()[0][1].content().to_string();
        assert_eq!(prompt.contains("KB: binary search halves"), has_context);
    }
}

/// **Scenario**: A 60-step lesson with a classifier that never answers in JSON and a
/// replanner that keeps adding 60 more steps runs into the node-run budget; the run still
/// returns the executed records and a document, with the unexecuted steps left over.
#[tokio::test]
async fn long_replan_heavy_lesson_completes_within_budget() {
    let first: Vec<String> = (1..=60).map(|i| format!("Topic {}", i)).collect();
    let extra: Vec<String> = (1..=60).map(|i| format!("Extra topic {}", i)).collect();
    let planner = MockLlm::new("unused")
        .with_route(CLASSIFIER, MockReply::text("not json"))
        .with_route(
            REPLANNER,
            MockReply::text(serde_json::json!({ "action": { "steps": extra } }).to_string()),
        )
        .with_route(
            LESSON_PLANNER,
            MockReply::text(serde_json::json!({ "steps": first }).to_string()),
        );
    let models = Models::new(planner, MockLlm::new("### Topic\ndetail"));
    let outcome = runner(&models, PlanExecuteConfig::default())
        .run("Teach a semester of algorithms")
        .await
        .unwrap();

    assert!(outcome.records.len() > 60);
    assert!(!outcome.remaining_plan.is_empty());
    assert_eq!(outcome.records.len() + outcome.remaining_plan.len(), 120);
    assert!(outcome.records.iter().all(|r| r.status == RecordStatus::Completed));
    assert_eq!(outcome.records[60].step, "Extra topic 1");
    assert!(outcome.document.contains("detail"));
    assert_ne!(outcome.document, FAILED_GRACEFULLY);
}

/// **Scenario**: Sequential mode; the only step fails, the replanner proposes it again and
/// the second attempt succeeds, leaving one failed and one completed record.
#[tokio::test]
async fn failed_step_is_retried_after_replan() {
    let planner = MockLlm::scripted([
        MockReply::text(r#"{"action": {"steps": ["Explain heaps"]}}"#),
        MockReply::text(DONE),
    ])
    .with_route(EXPERIMENT_PLANNER, MockReply::text(r#"{"steps": ["Explain heaps"]}"#));
    let executor = MockLlm::scripted([
        MockReply::failure("upstream timeout"),
        MockReply::text("### Explain heaps\nA heap is a complete binary tree."),
    ]);
    let models = Models::new(planner, executor);
    let config = PlanExecuteConfig {
        mode: ExecutionMode::Sequential,
        ..Default::default()
    };
    let outcome = runner(&models, config).run("Lab: heaps").await.unwrap();

    let statuses: Vec<(&str, RecordStatus)> = outcome
        .records
        .iter()
        .map(|r| (r.step.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("Explain heaps", RecordStatus::Failed),
            ("Explain heaps", RecordStatus::Completed),
        ]
    );
    assert!(outcome.document.contains("A heap is a complete binary tree."));
    assert_eq!(models.executor.call_count(), 2);
}
