//! End-to-end orchestration: fetch, filter, cluster, score, truncate.

use anyhow::{bail, Result};
use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cluster::{ClusterEngine, HeuristicClusterer};
use crate::model::{Event, NewsItem, QueryParams};
use crate::scoring::Scorer;
use crate::sources::SourceRegistry;

const DEFAULT_LIMIT: usize = 5;

pub struct Pipeline {
    sources: SourceRegistry,
    clusterer: Box<dyn ClusterEngine>,
    scorer: Scorer,
}

impl Pipeline {
    pub fn new(
        sources: SourceRegistry,
        clusterer: Box<dyn ClusterEngine>,
        scorer: Scorer,
    ) -> Self {
        Self {
            sources,
            clusterer,
            scorer,
        }
    }

    /// Runs the end-to-end flow and returns the hottest events. Fetch and
    /// clustering observe the caller's cancellation token; no internal
    /// timeout is imposed.
    pub async fn run(&self, cancel: &CancellationToken, params: QueryParams) -> Result<Vec<Event>> {
        if cancel.is_cancelled() {
            bail!("radar run cancelled");
        }

        let limit = if params.limit == 0 {
            DEFAULT_LIMIT
        } else {
            params.limit
        };

        let mut items = self
            .sources
            .fetch_all(cancel, params.from, params.to)
            .await?;
        if !params.language.is_empty() {
            items = filter_language(items, &params.language);
        }

        let item_count = items.len();
        let clusters = self.clusterer.build_clusters(cancel, items).await?;
        debug!(
            clusters = clusters.len(),
            items = item_count,
            "pipeline formed clusters"
        );

        let mut events = self.scorer.score_clusters(&clusters);
        events.truncate(limit);
        Ok(events)
    }
}

fn filter_language(items: Vec<NewsItem>, lang: &str) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| item.language.eq_ignore_ascii_case(lang))
        .collect()
}

/// Baseline clustering configuration.
pub fn default_clusterer() -> Box<dyn ClusterEngine> {
    Box::new(HeuristicClusterer::new(Duration::hours(6), 0.45))
}

/// Scorer preloaded with heuristic weights.
pub fn default_scorer() -> Scorer {
    Scorer::with_default_weights()
}
