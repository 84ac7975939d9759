//! Tool Entry Point Integration Tests
//!
//! Drives store_content, query_content and generate_quiz through their
//! JSON-shaped requests.

mod common;

use std::sync::atomic::Ordering;

use chrono::Utc;
use cognitive_canvas::cli::{call_tool, ToolName};
use cognitive_canvas::tools::{
    self, GenerateQuizRequest, QueryContentRequest, StoreContentRequest,
};
use cognitive_canvas::{ContentError, ContentType, ValidationError};

use common::{FakeExtractor, Fakes};

const URL: &str = "https://example.com/rust";

fn fakes() -> Fakes {
    Fakes::new(FakeExtractor::new().with_page(URL, "Rust Ownership", "Rust moves values."))
}

fn request(json: serde_json::Value) -> StoreContentRequest {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn test_store_content_url() {
    let manager = fakes().manager();

    let response = tools::store_content(
        &manager,
        request(serde_json::json!({"content_type": "url", "source_url": URL})),
    )
    .await
    .unwrap();

    assert_eq!(response.title, "Rust Ownership");
    assert_eq!(response.content_type, ContentType::Url);
    assert_eq!(response.source_url.as_deref(), Some(URL));
    assert_eq!(response.category, "Programming");
    assert_eq!(response.metadata.author, "Jane Roe");
    assert!(!response.content_id.is_empty());
}

#[tokio::test]
async fn test_store_content_text_with_labels() {
    let fakes = fakes();
    let manager = fakes.manager();

    let response = tools::store_content(
        &manager,
        request(serde_json::json!({
            "content_type": "text",
            "text": "Borrowing lets code read without owning.",
            "title": "Borrowing",
            "custom_category": "Notes",
            "custom_tags": ["rust"]
        })),
    )
    .await
    .unwrap();

    assert_eq!(response.title, "Borrowing");
    assert_eq!(response.category, "Notes");
    assert_eq!(response.tags, vec!["rust"]);
    assert!(response.source_url.is_none());
    assert_eq!(fakes.completion.category_calls.load(Ordering::SeqCst), 0);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["content_type"], "text");
    assert!(json["metadata"]["abstract"].is_string());
}

#[tokio::test]
async fn test_store_content_validates_before_io() {
    let fakes = fakes();
    let manager = fakes.manager();

    let err = tools::store_content(&manager, request(serde_json::json!({"content_type": "url"})))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Validation(ValidationError::MissingField { field: "source_url", .. })
    ));

    let err = tools::store_content(
        &manager,
        request(serde_json::json!({"content_type": "code", "source_url": URL})),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Validation(ValidationError::MissingField { field: "text", .. })
    ));

    let err = tools::store_content(
        &manager,
        request(serde_json::json!({"content_type": "video", "text": "x"})),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Validation(ValidationError::UnsupportedContentType(_))
    ));

    assert_eq!(fakes.extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fakes.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_query_content_by_category_and_date() {
    let manager = fakes().manager();
    for (text, category) in [("rust one", "Programming"), ("ocean two", "Nature")] {
        manager
            .store_from_text(text, None, Some(category), None)
            .await
            .unwrap();
    }

    let by_category = tools::query_content(
        &manager,
        QueryContentRequest {
            category: Some("Nature".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_category.results.len(), 1);
    assert_eq!(by_category.results[0].category, "Nature");
    assert!(by_category.results[0].score.is_none());

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let by_date = tools::query_content(
        &manager,
        QueryContentRequest {
            start_date: Some(today.clone()),
            end_date: Some(today),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_date.results.len(), 2);

    let ranked = tools::query_content(
        &manager,
        QueryContentRequest {
            category: Some("Programming".to_string()),
            query_text: Some("rust".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ranked.results.len(), 1);
    assert!(ranked.results[0].score.is_some());
}

#[tokio::test]
async fn test_query_content_requires_one_selector() {
    let manager = fakes().manager();

    let err = tools::query_content(&manager, QueryContentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Validation(ValidationError::MissingQuerySelector)
    ));

    let err = tools::query_content(
        &manager,
        QueryContentRequest {
            start_date: Some("2024-01-01".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Validation(ValidationError::IncompleteDateRange)
    ));
}

#[tokio::test]
async fn test_generate_quiz_tool() {
    let fakes = fakes();
    let manager = fakes.manager();

    let request: GenerateQuizRequest = serde_json::from_value(serde_json::json!({
        "quiz_type": "mcq",
        "content_summaries": ["Ownership moves values"],
        "category": "Programming"
    }))
    .unwrap();
    let quiz = tools::generate_quiz(&manager, request).await.unwrap();
    assert_eq!(quiz.questions.len(), 1);

    {
        let prompts = fakes.completion.quiz_prompts.lock().unwrap();
        assert!(prompts[0].contains("Difficulty: mixed"));
        assert!(prompts[0].contains("5-question"));
    }

    let request: GenerateQuizRequest = serde_json::from_value(serde_json::json!({
        "quiz_type": "essay",
        "content_summaries": ["x"],
        "category": "Programming"
    }))
    .unwrap();
    let err = tools::generate_quiz(&manager, request).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Quiz generation failed: Unsupported quiz type: essay"
    );
    assert_eq!(fakes.completion.quiz_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_call_tool_routes_json_payloads() {
    let manager = fakes().manager();

    let stored = call_tool(
        &manager,
        ToolName::Store,
        r#"{"content_type": "code", "text": "fn main() {}", "custom_category": "Snippets"}"#,
    )
    .await
    .unwrap();
    assert_eq!(stored["title"], "Code snippet");
    assert_eq!(stored["category"], "Snippets");

    let queried = call_tool(&manager, ToolName::Query, r#"{"category": "Snippets", "k": 3}"#)
        .await
        .unwrap();
    assert_eq!(queried["results"].as_array().map(Vec::len), Some(1));

    let err = call_tool(&manager, ToolName::Quiz, "not json").await.unwrap_err();
    assert!(err.to_string().contains("Invalid generate_quiz payload"));
}
