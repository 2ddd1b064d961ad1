//! LLM-backed clustering with a signature cache and heuristic fallback.
//!
//! The model output is treated as untrusted input: the JSON payload is
//! carved out of the raw completion text, decoded leniently, and every
//! referenced news id is reconciled against the local input before it can
//! reach a cluster.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cluster::{Cluster, ClusterAnnotations, ClusterEngine};
use crate::llm::{ChatClient, ChatCompletionRequest, Message};
use crate::model::NewsItem;

struct CacheEntry {
    clusters: Vec<Cluster>,
    expires_at: Instant,
}

/// Delegates clustering to a chat model, falling back to a local strategy
/// when the model is unavailable or returns an unusable payload.
pub struct LlmClusterer {
    pub client: Option<Arc<dyn ChatClient>>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_items: usize,
    pub fallback: Option<Arc<dyn ClusterEngine>>,
    pub cache_ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl LlmClusterer {
    pub fn new(
        client: Option<Arc<dyn ChatClient>>,
        model: impl Into<String>,
        fallback: Option<Arc<dyn ClusterEngine>>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 1024,
            max_items: 40,
            fallback,
            cache_ttl: Duration::from_secs(300),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    async fn build_with_fallback(
        &self,
        cancel: &CancellationToken,
        items: Vec<NewsItem>,
        cause: anyhow::Error,
    ) -> Result<Vec<Cluster>> {
        warn!(cause = %cause, "llm clusterer falling back");
        let Some(fallback) = &self.fallback else {
            return Err(cause);
        };
        fallback
            .build_clusters(cancel, items)
            .await
            .map_err(|fb_err| anyhow!("llm fallback error: {fb_err} (original: {cause})"))
    }

    fn cache_lookup(&self, signature: &str) -> Option<Vec<Cluster>> {
        let mut cache = self.cache.lock().expect("llm cache poisoned");
        let now = Instant::now();
        cache.retain(|_, entry| entry.expires_at > now);
        cache.get(signature).map(|entry| entry.clusters.clone())
    }

    fn cache_insert(&self, signature: String, clusters: &[Cluster]) {
        let mut cache = self.cache.lock().expect("llm cache poisoned");
        cache.insert(
            signature,
            CacheEntry {
                clusters: clusters.to_vec(),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );
    }
}

#[async_trait]
impl ClusterEngine for LlmClusterer {
    async fn build_clusters(
        &self,
        cancel: &CancellationToken,
        items: Vec<NewsItem>,
    ) -> Result<Vec<Cluster>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let Some(client) = self.client.clone().filter(|_| !self.model.is_empty()) else {
            return self
                .build_with_fallback(cancel, items, anyhow!("llm clusterer misconfigured"))
                .await;
        };

        let mut sorted: Vec<NewsItem> = if self.max_items > 0 && items.len() > self.max_items {
            items[..self.max_items].to_vec()
        } else {
            items.clone()
        };
        sorted.sort_by_key(|item| item.published());

        let signature = input_signature(&sorted, &self.model);
        if let Some(hit) = self.cache_lookup(&signature) {
            debug!(clusters = hit.len(), "llm cluster cache hit");
            return Ok(hit);
        }

        let messages = match build_prompt(&sorted) {
            Ok(messages) => messages,
            Err(err) => return self.build_with_fallback(cancel, items, err).await,
        };

        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            top_p: Some(0.9),
        };

        debug!(items = sorted.len(), model = %self.model, "requesting llm clustering");

        let resp = match client.chat_completion(req).await {
            Ok(resp) => resp,
            Err(err) => return self.build_with_fallback(cancel, items, err).await,
        };
        let Some(choice) = resp.choices.first() else {
            return self
                .build_with_fallback(cancel, items, anyhow!("llm response missing choices"))
                .await;
        };

        let clusters = match parse_response(&choice.message.content, &items) {
            Ok(clusters) => clusters,
            Err(err) => return self.build_with_fallback(cancel, items, err).await,
        };
        if clusters.is_empty() {
            return self
                .build_with_fallback(cancel, items, anyhow!("llm response returned no clusters"))
                .await;
        }

        self.cache_insert(signature, &clusters);
        Ok(clusters)
    }
}

/// Deterministic identity of a clusterer input: the ordered `(id, url,
/// unix-timestamp)` triples of the sorted view plus the model name. No
/// wall-clock component, so identical inputs hit the cache regardless of
/// request time.
fn input_signature(sorted: &[NewsItem], model: &str) -> String {
    let mut sig = String::with_capacity(sorted.len() * 48);
    for item in sorted {
        sig.push_str(&item.id);
        sig.push('|');
        sig.push_str(&item.url);
        sig.push('|');
        sig.push_str(&item.published().timestamp().to_string());
        sig.push(';');
    }
    sig.push_str(model);
    sig
}

#[derive(Serialize)]
struct PromptItem<'a> {
    id: &'a str,
    headline: &'a str,
    summary: &'a str,
    body: &'a str,
    source: &'a str,
    url: &'a str,
    language: &'a str,
    published_at: String,
    tickers: &'a [String],
    entities: &'a [String],
}

fn build_prompt(items: &[NewsItem]) -> Result<Vec<Message>> {
    #[derive(Serialize)]
    struct Payload<'a> {
        news: Vec<PromptItem<'a>>,
    }

    let payload = Payload {
        news: items
            .iter()
            .map(|item| PromptItem {
                id: &item.id,
                headline: &item.headline,
                summary: &item.summary,
                body: &item.body,
                source: &item.source,
                url: &item.url,
                language: &item.language,
                published_at: item.published().to_rfc3339(),
                tickers: &item.tickers,
                entities: &item.entities,
            })
            .collect(),
    };

    let news_json = serde_json::to_string_pretty(&payload).context("llm prompt marshal")?;

    let system = "You are RADAR, an expert financial analyst who groups related financial news \
                  into distinct market events. Respond STRICTLY with valid JSON.";

    let user = format!(
        r#"Group the following financial news into coherent events.
Rules:
- Use a stable identifier for each event (e.g. "event_1").
- Include every news id in exactly one cluster.
- Prefer grouping when the news refers to the same company, instrument, regulator, or macro theme even across languages.
- Provide both English and Russian short summaries for each cluster.
- Provide a short justification (English + Russian) why the event matters now.
- Infer entities and tickers from the statements when missing.

Respond with JSON using this schema:
{{
  "clusters": [
    {{
      "id": "event_1",
      "news_ids": ["id_a", "id_b"],
      "primary_news_id": "id_a",
      "summary_en": "...",
      "summary_ru": "...",
      "why_now_en": "...",
      "why_now_ru": "...",
      "entities": ["..."],
      "tickers": ["..."]
    }}
  ]
}}

News payload:
{news_json}"#
    );

    Ok(vec![
        Message::new("system", system),
        Message::new("user", user),
    ])
}

#[derive(Debug, Default, Deserialize)]
struct DecodedResponse {
    #[serde(default)]
    clusters: Vec<DecodedCluster>,
}

#[derive(Debug, Default, Deserialize)]
struct DecodedCluster {
    #[serde(default)]
    id: String,
    #[serde(default)]
    news_ids: Vec<String>,
    #[serde(default)]
    primary_news_id: String,
    #[serde(default)]
    summary_en: String,
    #[serde(default)]
    summary_ru: String,
    #[serde(default)]
    why_now_en: String,
    #[serde(default)]
    why_now_ru: String,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    tickers: Vec<String>,
}

fn parse_response(content: &str, items: &[NewsItem]) -> Result<Vec<Cluster>> {
    let payload =
        extract_json(content).ok_or_else(|| anyhow!("llm response missing json payload"))?;

    let decoded: DecodedResponse =
        serde_json::from_str(payload).context("llm response decode")?;

    if decoded.clusters.is_empty() {
        return Err(anyhow!("llm response contains no clusters"));
    }

    let item_by_id: HashMap<&str, &NewsItem> =
        items.iter().map(|item| (item.id.as_str(), item)).collect();

    let mut clusters = Vec::with_capacity(decoded.clusters.len());
    for declared in decoded.clusters {
        let mut members: Vec<NewsItem> = declared
            .news_ids
            .iter()
            .filter_map(|id| item_by_id.get(id.as_str()).map(|item| (*item).clone()))
            .collect();
        if members.is_empty() {
            continue;
        }

        members.sort_by_key(|item| item.published());

        let mut primary = if declared.primary_news_id.is_empty() {
            members[0].clone()
        } else {
            match item_by_id.get(declared.primary_news_id.as_str()) {
                Some(item) => (*item).clone(),
                None => members[0].clone(),
            }
        };

        let start = members[0].published();
        let end = members[members.len() - 1].published();

        let entities = if declared.entities.is_empty() {
            collect_strings(&members, |item| &item.entities)
        } else {
            declared.entities
        };
        let tickers = if declared.tickers.is_empty() {
            collect_strings(&members, |item| &item.tickers)
        } else {
            declared.tickers
        };

        let annotations = ClusterAnnotations {
            summary_en: declared.summary_en,
            summary_ru: declared.summary_ru,
            why_now_en: declared.why_now_en,
            why_now_ru: declared.why_now_ru,
            entities,
            tickers,
        };

        // surfacing the model summary through the primary keeps the draft
        // lead populated for summary-less items
        if !annotations.summary_en.is_empty() && primary.summary.is_empty() {
            primary.summary = annotations.summary_en.clone();
        }

        let id = prefer_id(&declared.id, &primary.id);

        clusters.push(Cluster {
            id,
            items: members,
            primary,
            start_time: start,
            end_time: end,
            annotations: Some(annotations),
        });
    }

    Ok(clusters)
}

fn collect_strings<F>(items: &[NewsItem], selector: F) -> Vec<String>
where
    F: Fn(&NewsItem) -> &Vec<String>,
{
    let mut set: Vec<String> = items
        .iter()
        .flat_map(|item| selector(item).iter())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    set.sort();
    set.dedup();
    set
}

fn prefer_id(candidate: &str, fallback: &str) -> String {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        fallback.to_string()
    } else {
        candidate.to_string()
    }
}

fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&content[start..=end])
}
