//! Strict decoding of raw news documents.
//!
//! Unknown fields are rejected outright; records missing a headline or url
//! are skipped; a malformed timestamp fails the whole decode.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{dedupe_strings, NewsItem};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNewsItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    country: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    sentiment: f64,
    #[serde(default)]
    importance_tag: String,
}

pub fn decode_news_items(data: &[u8]) -> Result<Vec<NewsItem>> {
    let raws: Vec<RawNewsItem> = serde_json::from_slice(data).context("decode JSON")?;

    let mut items = Vec::with_capacity(raws.len());
    for raw in raws {
        if raw.headline.is_empty() || raw.url.is_empty() {
            continue;
        }
        let published = DateTime::parse_from_rfc3339(&raw.published_at)
            .with_context(|| format!("parse time for {}", raw.id))?
            .with_timezone(&Utc);
        items.push(NewsItem {
            id: raw.id,
            headline: raw.headline,
            summary: raw.summary,
            body: raw.body,
            source: raw.source,
            url: raw.url,
            language: raw.language,
            published_at: Some(published),
            tickers: dedupe_strings(raw.tickers),
            entities: dedupe_strings(raw.entities),
            country: raw.country,
            category: raw.category,
            sentiment: raw.sentiment,
            importance_tag: raw.importance_tag,
        });
    }

    Ok(items)
}
