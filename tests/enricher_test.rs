//! Enrichment scenarios: implicit-keyword extraction and the daily
//! cost-cap refusal.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{FakeLlm, FakeStore};
use tnse::domain::{
    Category, CollectedPost, DomainError, EnrichmentOutcome, LlmUsageEntry, MicroUsd, Sentiment,
};
use tnse::ports::outbound::{CompletionResult, Store, WriteOutcome};
use tnse::usecases::Enricher;
use uuid::Uuid;

async fn seed_post_with_text(store: &FakeStore, text: &str) -> Uuid {
    let channel_id = Uuid::new_v4();
    store.seed_channel(common::channel_fixture(1, 100));
    let outcomes = store
        .write_collection_batch(
            channel_id,
            vec![CollectedPost {
                telegram_message_id: 1,
                published_at: Utc::now(),
                is_forwarded: false,
                forward_from_channel_id: None,
                forward_from_message_id: None,
                text_content: Some(text.to_string()),
                language: Some("en".to_string()),
                media: Vec::new(),
                view_count: 10,
                forward_count: 0,
                reply_count: 0,
                reaction_score: 0.0,
                relative_engagement: 0.0,
                reactions: Vec::new(),
            }],
            Some(1),
        )
        .await
        .unwrap();
    assert!(matches!(outcomes[0], Ok(WriteOutcome::Inserted)));
    store.post_id_for(channel_id, 1).unwrap()
}

fn completion(json: serde_json::Value, prompt_tokens: i32, completion_tokens: i32) -> CompletionResult {
    CompletionResult {
        content: json.to_string(),
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
        model: "test-model".to_string(),
        duration_ms: 42,
        parsed_json: Some(json),
    }
}

#[tokio::test]
async fn enrichment_surfaces_implicit_keywords_not_present_in_text() {
    let store = Arc::new(FakeStore::new());
    let post_id = seed_post_with_text(
        &store,
        "Minister caught accepting cash from contractor",
    )
    .await;

    let llm = Arc::new(FakeLlm::new(
        vec![Ok(completion(
            serde_json::json!({
                "explicit_keywords": ["minister", "cash", "contractor"],
                "implicit_keywords": ["corruption", "bribery", "scandal", "politics"],
                "category": "politics",
                "sentiment": "negative",
                "entities": {"persons": [], "organizations": [], "locations": []}
            }),
            120,
            40,
        ))],
        MicroUsd::from_dollars(0.01),
    ));

    let enricher = Enricher::new(llm, Arc::clone(&store), "test-model".to_string(), MicroUsd::from_dollars(10.0));
    let outcome = enricher.enrich_post(post_id).await.unwrap();

    let EnrichmentOutcome::Completed(enrichment) = outcome else {
        panic!("expected a completed enrichment, got {outcome:?}");
    };
    assert!(enrichment.implicit_keywords.contains("corruption"));
    assert!(!enrichment.explicit_keywords.contains("corruption"));
    assert_eq!(enrichment.category, Category::Politics);
    assert_eq!(enrichment.sentiment, Sentiment::Negative);
    assert_eq!(store.usage_len(), 1);
}

#[tokio::test]
async fn cost_cap_refuses_without_calling_the_llm_or_writing_usage() {
    let store = Arc::new(FakeStore::new());
    let post_id = seed_post_with_text(&store, "some post text").await;

    // Six prior entries summing to $0.95, all "today".
    for _ in 0..6 {
        store.seed_usage(LlmUsageEntry {
            id: Uuid::new_v4(),
            model: "test-model".to_string(),
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
            estimated_cost_usd: MicroUsd::from_dollars(0.95 / 6.0),
            task_name: "enrich_post".to_string(),
            posts_processed: 1,
            created_at: Utc::now(),
        });
    }

    // The LLM would charge $0.10 if called -- it must never be called.
    let llm = Arc::new(FakeLlm::new(
        vec![Err(DomainError::Ai("should not be invoked".to_string()))],
        MicroUsd::from_dollars(0.10),
    ));

    let enricher = Enricher::new(Arc::clone(&llm), Arc::clone(&store), "test-model".to_string(), MicroUsd::from_dollars(1.0));
    let outcome = enricher.enrich_post(post_id).await.unwrap();

    assert!(matches!(outcome, EnrichmentOutcome::Error(_)));
    assert!(store.get_enrichment(post_id).await.unwrap().is_none());
    assert_eq!(store.usage_len(), 6, "a refused call must not append a usage entry");
    assert_eq!(llm.call_count(), 0, "the cap must be checked before the LLM is ever invoked");
}

#[tokio::test]
async fn already_enriched_post_is_skipped() {
    let store = Arc::new(FakeStore::new());
    let post_id = seed_post_with_text(&store, "text").await;

    let llm = Arc::new(FakeLlm::new(
        vec![Ok(completion(
            serde_json::json!({
                "explicit_keywords": [], "implicit_keywords": [],
                "category": "other", "sentiment": "neutral",
                "entities": {"persons": [], "organizations": [], "locations": []}
            }),
            10,
            5,
        ))],
        MicroUsd::ZERO,
    ));
    let enricher = Enricher::new(llm, Arc::clone(&store), "m".to_string(), MicroUsd::from_dollars(10.0));
    enricher.enrich_post(post_id).await.unwrap();

    let second = enricher.enrich_post(post_id).await.unwrap();
    assert!(matches!(second, EnrichmentOutcome::Skipped(_)));
}
