// tests/llm_clusterer.rs
//
// LLM clustering behavior against a fake chat client: happy path,
// fallback on failure, and signature-cache deduplication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use news_radar::cluster::{ClusterEngine, HeuristicClusterer};
use news_radar::llm::{ChatClient, ChatCompletionRequest, ChatCompletionResponse, Choice};
use news_radar::llm_cluster::LlmClusterer;
use news_radar::localize::bilingual;
use news_radar::model::NewsItem;

struct FakeChatClient {
    response: String,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeChatClient {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn chat_completion(
        &self,
        _req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        if self.fail {
            bail!("boom");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut choice = Choice::default();
        choice.message.content = self.response.clone();
        Ok(ChatCompletionResponse {
            choices: vec![choice],
        })
    }
}

fn heuristic() -> Arc<dyn ClusterEngine> {
    Arc::new(HeuristicClusterer::new(chrono::Duration::hours(6), 0.45))
}

fn sample_items() -> Vec<NewsItem> {
    vec![
        NewsItem {
            id: "n1".into(),
            headline: "Company A cuts guidance".into(),
            source: "Reuters".into(),
            url: "https://example.com/a".into(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 10, 3, 8, 0, 0).unwrap()),
            tickers: vec!["CMA".into()],
            entities: vec!["Company A".into()],
            ..NewsItem::default()
        },
        NewsItem {
            id: "n2".into(),
            headline: "Factory fire hits Company A supplier".into(),
            source: "Bloomberg".into(),
            url: "https://example.com/b".into(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 10, 3, 9, 30, 0).unwrap()),
            tickers: vec!["CMA".into()],
            entities: vec!["Company A".into()],
            ..NewsItem::default()
        },
    ]
}

#[tokio::test]
async fn llm_clusterer_uses_the_model_response() {
    let fake = FakeChatClient::new(
        r#"{
        "clusters": [
            {
                "id": "event_supply",
                "news_ids": ["n1", "n2"],
                "primary_news_id": "n1",
                "summary_en": "Company A faces supply disruption",
                "summary_ru": "Компания A сталкивается с перебоями поставок",
                "why_now_en": "Guidance cut confirmed by operational hit",
                "why_now_ru": "Снижение прогноза подтверждается операционными проблемами",
                "entities": ["Company A"],
                "tickers": ["CMA"]
            }
        ]
    }"#,
    );

    let clusterer = LlmClusterer::new(
        Some(fake.clone()),
        "gemini-2.5-flash",
        Some(heuristic()),
    )
    .with_sampling(0.2, 512)
    .with_max_items(10)
    .with_cache_ttl(Duration::from_secs(60));

    let clusters = clusterer
        .build_clusters(&CancellationToken::new(), sample_items())
        .await
        .expect("build clusters");

    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].id, "event_supply");
    assert_eq!(clusters[0].primary.id, "n1");

    let annotations = clusters[0].annotations.as_ref().expect("annotations");
    assert_eq!(
        bilingual(&annotations.why_now_en, &annotations.why_now_ru),
        "Guidance cut confirmed by operational hit / Снижение прогноза подтверждается операционными проблемами"
    );
}

#[tokio::test]
async fn chat_failure_falls_back_to_the_heuristic() {
    let clusterer = LlmClusterer::new(
        Some(FakeChatClient::failing()),
        "gemini-2.5-flash",
        Some(heuristic()),
    )
    .with_cache_ttl(Duration::from_secs(60));

    let clusters = clusterer
        .build_clusters(&CancellationToken::new(), sample_items())
        .await
        .expect("fallback should succeed");

    assert!(!clusters.is_empty());
}

#[tokio::test]
async fn garbage_response_falls_back_to_the_heuristic() {
    let clusterer = LlmClusterer::new(
        Some(FakeChatClient::new("I could not produce any JSON, sorry.")),
        "gemini-2.5-flash",
        Some(heuristic()),
    );

    let clusters = clusterer
        .build_clusters(&CancellationToken::new(), sample_items())
        .await
        .expect("fallback should succeed");

    assert!(!clusters.is_empty());
    // fallback clusters carry no model annotations
    assert!(clusters.iter().all(|c| c.annotations.is_none()));
}

#[tokio::test]
async fn missing_client_uses_the_fallback() {
    let clusterer = LlmClusterer::new(None, "gemini-2.5-flash", Some(heuristic()));
    let clusters = clusterer
        .build_clusters(&CancellationToken::new(), sample_items())
        .await
        .expect("fallback should succeed");
    assert_eq!(clusters.len(), 1);
}

#[tokio::test]
async fn identical_inputs_hit_the_cache_within_ttl() {
    let fake = FakeChatClient::new(
        r#"{"clusters":[{"id":"same","news_ids":["n1","n2"],"primary_news_id":"n1"}]}"#,
    );

    let clusterer = LlmClusterer::new(
        Some(fake.clone()),
        "gemini-2.5-flash",
        Some(heuristic()),
    )
    .with_cache_ttl(Duration::from_secs(60));

    let cancel = CancellationToken::new();
    clusterer
        .build_clusters(&cancel, sample_items())
        .await
        .expect("first call");
    let second = clusterer
        .build_clusters(&cancel, sample_items())
        .await
        .expect("second call");

    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, "same");
}

#[tokio::test]
async fn expired_cache_entries_trigger_a_fresh_call() {
    let fake = FakeChatClient::new(
        r#"{"clusters":[{"id":"same","news_ids":["n1","n2"],"primary_news_id":"n1"}]}"#,
    );

    let clusterer = LlmClusterer::new(
        Some(fake.clone()),
        "gemini-2.5-flash",
        Some(heuristic()),
    )
    .with_cache_ttl(Duration::from_millis(10));

    let cancel = CancellationToken::new();
    clusterer
        .build_clusters(&cancel, sample_items())
        .await
        .expect("first call");
    tokio::time::sleep(Duration::from_millis(30)).await;
    clusterer
        .build_clusters(&cancel, sample_items())
        .await
        .expect("second call");

    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_input_yields_no_clusters_and_no_calls() {
    let fake = FakeChatClient::new(r#"{"clusters":[]}"#);
    let clusterer = LlmClusterer::new(
        Some(fake.clone()),
        "gemini-2.5-flash",
        Some(heuristic()),
    );

    let clusters = clusterer
        .build_clusters(&CancellationToken::new(), Vec::new())
        .await
        .expect("empty input");

    assert!(clusters.is_empty());
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}
