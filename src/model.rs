//! Canonical entities flowing through the radar pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A raw news document fetched from an upstream source.
#[derive(Debug, Clone, Default)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    pub summary: String,
    pub body: String,
    pub source: String,
    pub url: String,
    pub language: String,
    pub published_at: Option<DateTime<Utc>>,
    pub tickers: Vec<String>,
    pub entities: Vec<String>,
    pub country: String,
    pub category: String,
    pub sentiment: f64,
    pub importance_tag: String,
}

impl NewsItem {
    /// Timestamp with the unset case pinned to the epoch, so sorting and
    /// window math never branch on `Option`.
    pub fn published(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// An aggregated hot news candidate with scoring metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub dedup_group: String,
    pub headline: String,
    pub hotness: f64,
    pub why_now: String,
    pub entities: Vec<String>,
    pub tickers: Vec<String>,
    pub sources: Vec<SourceRef>,
    pub timeline: Vec<TimelineEntry>,
    pub draft: Draft,
}

/// A reference used to corroborate an event.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub title: String,
    pub source: String,
    pub url: String,
    pub published: DateTime<Utc>,
}

/// One key update within an event cluster.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub label: String,
    pub source: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured draft for downstream publications.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Draft {
    pub title: String,
    pub lead: String,
    pub bullets: Vec<String>,
    pub quote: String,
}

/// Timeframe and request configuration provided by the caller.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub limit: usize,
    pub language: String,
}

/// Trim, drop empties, and deduplicate case-insensitively while preserving
/// the original casing and first-seen order.
pub fn dedupe_strings(values: Vec<String>) -> Vec<String> {
    if values.len() <= 1 {
        return values;
    }
    let mut seen = std::collections::HashSet::with_capacity(values.len());
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim().to_string();
        if v.is_empty() {
            continue;
        }
        if seen.insert(v.to_uppercase()) {
            out.push(v);
        }
    }
    out
}
