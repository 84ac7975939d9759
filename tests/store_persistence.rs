//! Vector Store Persistence Tests
//!
//! Records written through one store handle are readable, unchanged,
//! after the file is reopened.

mod common;

use cognitive_canvas::library::{Classification, ContentSource, RawMetadata};
use cognitive_canvas::{ContentId, ContentRecord, ContentType, VectorStore};
use tempfile::TempDir;

use common::{FakeExtractor, Fakes};

fn record(source: ContentSource, content: &str, category: &str, embedding: Vec<f32>) -> ContentRecord {
    ContentRecord::new(
        source,
        content,
        "Title",
        Classification {
            category: category.to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
            summary: format!("About {}", content),
        },
        embedding,
        RawMetadata {
            keywords: vec!["k1".to_string()],
            citation: Some("Doe 2024".to_string()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("store.db");

    let url = record(
        ContentSource::Url("https://example.com/a".to_string()),
        "first",
        "Science",
        vec![1.0, 0.0],
    );
    let text = record(ContentSource::Text, "second", "History", vec![0.0, 1.0]);

    {
        let store = VectorStore::open(&path).unwrap();
        assert_eq!(store.store(&url).await.unwrap(), url.id);
        store.store(&text).await.unwrap();
    }

    let store = VectorStore::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    assert_eq!(store.count().await.unwrap(), 2);

    let mut entries = store
        .get_by_ids(&[url.id.clone(), ContentId::from_raw("unknown")])
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);

    let restored = entries.remove(0).into_record().unwrap();
    assert_eq!(restored.id, url.id);
    assert_eq!(restored.content_type, ContentType::Url);
    assert_eq!(restored.source_url.as_deref(), Some("https://example.com/a"));
    assert_eq!(restored.original_content, "first");
    assert_eq!(restored.tags, vec!["a", "b"]);
    assert_eq!(restored.embedding, vec![1.0, 0.0]);
    assert_eq!(restored.metadata.keywords, vec!["k1"]);
    assert_eq!(restored.metadata.citation.as_deref(), Some("Doe 2024"));
    assert_eq!(
        restored.timestamp.timestamp_millis(),
        url.timestamp.timestamp_millis()
    );

    let hits = store.similarity_search(&[0.0, 1.0], 1, None).await.unwrap();
    assert_eq!(hits[0].entry.id, text.id);
    assert!((hits[0].score - 1.0).abs() < 1e-6);

    let page = store.get_page(1, 10).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_empty_embedding_is_rejected() {
    let store = VectorStore::open_in_memory().unwrap();
    let bad = record(ContentSource::Code, "fn x() {}", "Code", Vec::new());

    let err = store.store(&bad).await.unwrap_err();
    assert!(err.to_string().starts_with("Vector database error"));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_manager_over_file_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let fakes = Fakes::new(FakeExtractor::new());

    let id = {
        let manager = fakes.manager_with_store(VectorStore::open(&path).unwrap());
        manager
            .store_from_text("rust notes", None, Some("Notes"), None)
            .await
            .unwrap()
            .id
    };

    let manager = fakes.manager_with_store(VectorStore::open(&path).unwrap());
    let notes = manager.retrieve_by_category("Notes", None).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, id);
    assert_eq!(manager.get_statistics().await.unwrap().total_content, 1);
}
