//! Pluggable upstream news providers and their registry.

pub mod ingest;
pub mod static_file;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::model::NewsItem;

pub use ingest::IngestSource;
pub use static_file::StaticFileSource;

/// An upstream provider capable of fetching news items within a window.
/// The window is inclusive on both bounds.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>>;
}

/// Keeps track of available sources; immutable after construction apart
/// from explicit `add` calls during wiring.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Result<Self> {
        if sources.is_empty() {
            bail!("radar: at least one source is required");
        }
        Ok(Self { sources })
    }

    pub fn add(&mut self, source: Arc<dyn Source>) {
        self.sources.push(source);
    }

    /// Aggregates items from each registered source in registration order.
    /// The first failing source aborts the whole fetch with its name
    /// attached; no partial result is returned.
    pub async fn fetch_all(
        &self,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>> {
        let mut results = Vec::new();
        for source in &self.sources {
            let mut items = source
                .fetch(cancel, from, to)
                .await
                .with_context(|| format!("fetch from {}", source.name()))?;
            results.append(&mut items);
        }
        Ok(results)
    }
}
