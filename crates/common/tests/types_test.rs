use docrag_common::{BreakType, Chunk, RetrievedChunk};

#[test]
fn chunk_ordinals_stay_contiguous_across_a_page() {
    let page_url = "https://docs.example.com/guide".to_string();
    let chunks: Vec<Chunk> = (0..3)
        .map(|i| Chunk {
            id: uuid::Uuid::new_v4(),
            page_url: page_url.clone(),
            ordinal: i,
            content: format!("chunk {i}"),
            context: None,
            break_type: BreakType::Paragraph,
            char_start: (i as i64) * 100,
            char_end: (i as i64) * 100 + 100,
            embedding: vec![0.1; 4],
            created_at: chrono::Utc::now(),
        })
        .collect();

    let ordinals: Vec<i32> = chunks.iter().map(|c| c.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);

    for window in chunks.windows(2) {
        assert!(window[0].char_end <= window[1].char_start);
    }
}

#[test]
fn break_type_serializes_as_snake_case() {
    let json = serde_json::to_string(&BreakType::MarkdownHeader).unwrap();
    assert_eq!(json, "\"markdown_header\"");
}

#[test]
fn retrieved_chunk_round_trips_through_json() {
    let result = RetrievedChunk {
        chunk_id: uuid::Uuid::new_v4(),
        url: "https://docs.example.com/a".into(),
        content: "hello".into(),
        similarity: 0.92,
    };
    let json = serde_json::to_string(&result).unwrap();
    let back: RetrievedChunk = serde_json::from_str(&json).unwrap();
    assert_eq!(result, back);
}
