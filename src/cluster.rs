//! Clustering of news items into deduplicated market-event groups.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::NewsItem;
use crate::similarity::{shares_token, similarity};

/// A deduplicated group of related news items.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub items: Vec<NewsItem>,
    pub primary: NewsItem,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub annotations: Option<ClusterAnnotations>,
}

/// Optional metadata supplied by LLMs.
#[derive(Debug, Clone, Default)]
pub struct ClusterAnnotations {
    pub summary_en: String,
    pub summary_ru: String,
    pub why_now_en: String,
    pub why_now_ru: String,
    pub entities: Vec<String>,
    pub tickers: Vec<String>,
}

/// Strategy used to group news items into clusters.
#[async_trait]
pub trait ClusterEngine: Send + Sync {
    async fn build_clusters(
        &self,
        cancel: &CancellationToken,
        items: Vec<NewsItem>,
    ) -> Result<Vec<Cluster>>;
}

/// Greedy single-pass clusterer driven by timing and textual similarity.
#[derive(Debug, Clone)]
pub struct HeuristicClusterer {
    pub time_window: Duration,
    pub similarity_threshold: f64,
    pub max_cluster_size: usize,
}

impl HeuristicClusterer {
    /// Out-of-range inputs fall back to the defaults (6h window, 0.45).
    pub fn new(time_window: Duration, threshold: f64) -> Self {
        let time_window = if time_window.is_zero() {
            Duration::hours(6)
        } else {
            time_window
        };
        let threshold = if threshold <= 0.0 || threshold > 1.0 {
            0.45
        } else {
            threshold
        };
        Self {
            time_window,
            similarity_threshold: threshold,
            max_cluster_size: 12,
        }
    }
}

#[async_trait]
impl ClusterEngine for HeuristicClusterer {
    async fn build_clusters(
        &self,
        _cancel: &CancellationToken,
        mut items: Vec<NewsItem>,
    ) -> Result<Vec<Cluster>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        items.sort_by_key(|item| item.published());

        let mut clusters: Vec<Cluster> = Vec::new();

        for item in items {
            let ts = item.published();
            let mut assigned = false;
            for cluster in clusters.iter_mut() {
                if cluster.items.len() >= self.max_cluster_size {
                    continue;
                }
                if !within_window(cluster.start_time, cluster.end_time, ts, self.time_window) {
                    continue;
                }
                if !cluster_contains_related(cluster, &item, self.similarity_threshold) {
                    continue;
                }

                if ts < cluster.start_time {
                    cluster.start_time = ts;
                }
                if ts > cluster.end_time {
                    cluster.end_time = ts;
                }
                // prioritise the earliest item as primary
                if ts < cluster.primary.published() {
                    cluster.primary = item.clone();
                }
                cluster.items.push(item.clone());
                assigned = true;
                break;
            }

            if !assigned {
                clusters.push(Cluster {
                    id: Uuid::new_v4().to_string(),
                    primary: item.clone(),
                    start_time: ts,
                    end_time: ts,
                    items: vec![item],
                    annotations: None,
                });
            }
        }

        Ok(clusters)
    }
}

fn within_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    ts: DateTime<Utc>,
    window: Duration,
) -> bool {
    ts >= start - window && ts <= end + window
}

fn cluster_contains_related(cluster: &Cluster, candidate: &NewsItem, threshold: f64) -> bool {
    cluster
        .items
        .iter()
        .any(|existing| are_related(existing, candidate, threshold))
}

fn are_related(a: &NewsItem, b: &NewsItem, threshold: f64) -> bool {
    if shares_token(&a.tickers, &b.tickers) || shares_token(&a.entities, &b.entities) {
        return true;
    }
    similarity(&a.headline, &b.headline) >= threshold
}
