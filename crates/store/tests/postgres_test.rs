use docrag_common::{BreakType, Chunk, StorageConfig};
use docrag_store::Store;

fn test_storage_config() -> StorageConfig {
    StorageConfig {
        database_url: std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set to run store integration tests"),
        min_connections: 1,
        max_connections: 5,
    }
}

fn sample_chunk(page_url: &str, ordinal: i32, dim: usize) -> Chunk {
    Chunk {
        id: uuid::Uuid::new_v4(),
        page_url: page_url.to_string(),
        ordinal,
        content: format!("chunk body {ordinal}"),
        context: None,
        break_type: BreakType::Paragraph,
        char_start: 0,
        char_end: 10,
        embedding: vec![0.1; dim],
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
#[ignore] // requires a live Postgres instance with pgvector installed
async fn connects_and_reports_healthy() {
    let store = Store::connect(&test_storage_config()).await.unwrap();
    store.health_check().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn replace_chunks_for_page_is_atomic_and_queryable() {
    let store = Store::connect(&test_storage_config()).await.unwrap();
    store.run_migrations(8).await.unwrap();

    let page_url = format!("https://docs.example.com/test-{}", uuid::Uuid::new_v4());
    sqlx::query("INSERT INTO pages (url) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(&page_url)
        .execute(&sqlx::PgPool::connect(&test_storage_config().database_url).await.unwrap())
        .await
        .unwrap();

    let chunks = vec![sample_chunk(&page_url, 0, 8), sample_chunk(&page_url, 1, 8)];
    store
        .replace_chunks_for_page(&page_url, "full page markdown", &chunks)
        .await
        .unwrap();

    let query_vec = vec![0.1; 8];
    let results = store.nearest(&query_vec, 5).await.unwrap();
    assert!(results.iter().any(|r| r.url == page_url));
}

#[tokio::test]
#[ignore]
async fn hybrid_search_deduplicates_and_fuses_scores() {
    let store = Store::connect(&test_storage_config()).await.unwrap();
    store.run_migrations(8).await.unwrap();

    let page_url = format!("https://docs.example.com/hybrid-{}", uuid::Uuid::new_v4());
    sqlx::query("INSERT INTO pages (url) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(&page_url)
        .execute(&sqlx::PgPool::connect(&test_storage_config().database_url).await.unwrap())
        .await
        .unwrap();

    let mut chunk = sample_chunk(&page_url, 0, 8);
    chunk.content = "authentication tokens expire after one hour".to_string();
    store
        .replace_chunks_for_page(&page_url, chunk.content.clone().as_str(), &[chunk.clone()])
        .await
        .unwrap();

    let results = store.hybrid(&chunk.embedding, "authentication tokens", 5).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|m| (0.0..=1.0).contains(&m.retrieved.similarity)));
    assert!(results.iter().all(|m| !m.embedding.is_empty()));
}
