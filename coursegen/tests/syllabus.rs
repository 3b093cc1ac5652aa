//! Integration tests: outline extraction and the syllabus lesson-plan workflow.


use std::sync::Arc;
use std::time::Duration;

use coursegen::agent::syllabus::{SYLLABUS_FAILED_GRACEFULLY, SYLLABUS_FALLBACK_HEADING};
use coursegen::prompts::default_from_embedded;
use coursegen::{
    MockLlm, MockReply, OutlineRequest, OutlineRunner, SyllabusConfig, SyllabusRunner,
};

const PARSE: &str = "expert at parsing course syllabi";
const EXPLAIN: &str = "You write explanations";
const ALLOCATE: &str = "allocates class time";

const TWO_CHAPTERS: &str = r#"{"chapters": [
    {"title": "Chapter 1: Searching", "knowledge_points": ["linear search", "binary search"]},
    {"title": "Chapter 2: Sorting", "knowledge_points": ["merge sort"]}
]}"#;
const ALLOCATION: &str =
    r#"{"activities": [{"name": "lecture", "minutes": 50}, {"name": "lab", "minutes": 40}], "rationale": "balanced"}"#;

fn runner(llm: MockLlm, writer: MockLlm, config: SyllabusConfig) -> SyllabusRunner {
    SyllabusRunner::new(
        Arc::new(llm),
        Arc::new(writer),
        None,
        &default_from_embedded(),
        config,
    )
    .expect("valid graph")
}

/// **Scenario**: Two chapters are generated and the writer's failure leaves the raw
/// draft, chapters in syllabus order separated by a rule.
#[tokio::test]
async fn syllabus_draft_falls_back_when_polish_fails() {
    let llm = MockLlm::new("unused")
        .with_route(PARSE, MockReply::text(TWO_CHAPTERS))
        .with_route(ALLOCATE, MockReply::text(ALLOCATION))
        .with_route(
            "Chapter: Chapter 1: Searching",
            MockReply::text(r#"["scan each item", "halve the range"]"#)
                .after(Duration::from_millis(50)),
        )
        .with_route("Chapter: Chapter 2: Sorting", MockReply::text(r#"["split and merge"]"#));
    let outcome = runner(llm, MockLlm::failing("writer down"), SyllabusConfig::default())
        .run("Algorithms syllabus")
        .await
        .unwrap();

    let doc = &outcome.document;
    assert!(doc.starts_with(SYLLABUS_FALLBACK_HEADING));
    let first = doc.find("## Chapter 1: Searching").unwrap();
    let rule = doc.find("\n\n---\n\n").unwrap();
    let second = doc.find("## Chapter 2: Sorting").unwrap();
    assert!(first < rule && rule < second);
    assert!(doc.contains("- **binary search**: halve the range"));
    assert!(doc.contains("- lab: 40 minutes"));
    assert_eq!(outcome.chapters.len(), 2);
}

#[tokio::test]
async fn syllabus_polish_result_is_the_document() {
    let llm = MockLlm::new("unused")
        .with_route(PARSE, MockReply::text(TWO_CHAPTERS))
        .with_route(EXPLAIN, MockReply::text(r#"["one", "two"]"#))
        .with_route(ALLOCATE, MockReply::text(ALLOCATION));
    let writer = Arc::new(MockLlm::new("# Course lesson plan\n\nfinal"));
    let runner = SyllabusRunner::new(
        Arc::new(llm),
        writer.clone(),
        None,
        &default_from_embedded(),
        SyllabusConfig::default(),
    )
    .unwrap();
    let outcome = runner.run("Algorithms").await.unwrap();
    assert_eq!(outcome.document, "# Course lesson plan\n\nfinal");
    // Chapter 2 has one point but got two explanations.
    assert!(outcome.chapters[1].knowledge[0]
        .explanation
        .contains("could not be generated"));
    assert!(writer.calls()[0][0].content().contains("## Chapter 2: Sorting"));
}

#[tokio::test]
async fn unparseable_syllabus_fails_gracefully() {
    let llm = MockLlm::new("no chapters here");
    let writer = MockLlm::new("never used");
    let outcome = runner(llm, writer, SyllabusConfig::default())
        .run("???")
        .await
        .unwrap();
    assert_eq!(outcome.document, SYLLABUS_FAILED_GRACEFULLY);
    assert!(outcome.chapters.is_empty());
}

/// **Scenario**: A chapter over its deadline becomes a "(failed)" placeholder in the draft.
#[tokio::test]
async fn slow_chapter_is_marked_failed() {
    let llm = MockLlm::new("unused")
        .with_route(PARSE, MockReply::text(TWO_CHAPTERS))
        .with_route(ALLOCATE, MockReply::text(ALLOCATION))
        .with_route(
            "Chapter: Chapter 1: Searching",
            MockReply::text(r#"["a", "b"]"#).after(Duration::from_millis(400)),
        )
        .with_route(EXPLAIN, MockReply::text(r#"["c"]"#));
    let config = SyllabusConfig {
        chapter_timeout: Some(Duration::from_millis(150)),
        ..Default::default()
    };
    let outcome = runner(llm, MockLlm::failing("down"), config)
        .run("Algorithms")
        .await
        .unwrap();
    assert_eq!(outcome.chapters[0].title, "Chapter 1: Searching (failed)");
    assert!(outcome.document.contains("## Chapter 1: Searching (failed)"));
    assert!(outcome.document.contains("- **merge sort**: c"));
}

#[tokio::test]
async fn outline_defaults_to_two_hour_classes() {
    let mock = Arc::new(MockLlm::new(
        r#"{"chapters": [{"title": "Chapter 2: Trees", "content": "BST", "order": 2},
                         {"title": "Chapter 1: Lists", "content": "arrays", "order": 1}]}"#,
    ));
    let runner = OutlineRunner::new(mock.clone(), &default_from_embedded(), true).unwrap();
    let chapters = runner
        .run(OutlineRequest::new("Data structures, 4 hours"))
        .await
        .unwrap();
    assert_eq!(chapters[0].title, "Chapter 1: Lists");
    assert_eq!(chapters[1].title, "Chapter 2: Trees");
    assert!(mock.calls()[0][0].content().contains("Includes lab sessions: false"));
}
