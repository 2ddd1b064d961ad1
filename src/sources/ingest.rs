//! In-memory store for ad-hoc news items submitted via the API.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Source;
use crate::model::NewsItem;

/// Thread-safe append/replace store with prune-by-age. The store is the
/// only long-lived owner of its items; `fetch` hands out snapshots.
pub struct IngestSource {
    name: String,
    items: RwLock<Vec<NewsItem>>,
}

impl IngestSource {
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() { "ingest" } else { name };
        Self {
            name: name.to_string(),
            items: RwLock::new(Vec::new()),
        }
    }

    /// Registers a news item, generating defaults when missing. An existing
    /// record with the same id is replaced in place.
    pub fn add(&self, mut item: NewsItem) -> NewsItem {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
        if item.published_at.is_none() {
            item.published_at = Some(Utc::now());
        }

        let mut items = self.items.write().expect("ingest store poisoned");
        if let Some(existing) = items.iter_mut().find(|existing| existing.id == item.id) {
            *existing = item.clone();
        } else {
            items.push(item.clone());
        }
        item
    }

    /// Drops items published before `ts` and returns the removed count.
    pub fn prune_older_than(&self, ts: DateTime<Utc>) -> usize {
        let mut items = self.items.write().expect("ingest store poisoned");
        let before = items.len();
        items.retain(|item| item.published() >= ts);
        before - items.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.read().expect("ingest store poisoned").len()
    }
}

#[async_trait]
impl Source for IngestSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>> {
        if cancel.is_cancelled() {
            bail!("fetch cancelled");
        }

        let items = self.items.read().expect("ingest store poisoned");
        let mut out: Vec<NewsItem> = items
            .iter()
            .filter(|item| {
                let ts = item.published();
                ts >= from && ts <= to
            })
            .cloned()
            .collect();
        drop(items);

        out.sort_by_key(|item| item.published());
        Ok(out)
    }
}
