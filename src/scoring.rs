//! Cluster scoring: multi-factor hotness plus event assembly.

use std::collections::{HashMap, HashSet};

use crate::cluster::Cluster;
use crate::draft::build_draft;
use crate::localize::bilingual;
use crate::model::{Event, SourceRef};
use crate::timeline::build_timeline;

/// Evaluates clusters and returns event projections sorted by hotness.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    pub source_weights: HashMap<String, f64>,
    pub tag_weights: HashMap<String, f64>,
}

impl Scorer {
    /// Scorer preloaded with the heuristic weight tables.
    pub fn with_default_weights() -> Self {
        let source_weights = [
            ("bloomberg", 0.9),
            ("reuters", 0.88),
            ("financial times", 0.85),
            ("central bank", 0.92),
            ("company call", 0.75),
            ("marketwatch", 0.7),
            ("finchat", 0.45),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let tag_weights = [
            ("guidance_cut", 0.95),
            ("supply_chain", 0.85),
            ("macro_policy", 0.8),
            ("flows", 0.6),
            ("management_comment", 0.55),
            ("positioning", 0.58),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            source_weights,
            tag_weights,
        }
    }

    /// Scores every cluster, drops non-positive events, and sorts the rest
    /// by hotness descending with dedup-group id as the deterministic
    /// tie-break.
    pub fn score_clusters(&self, clusters: &[Cluster]) -> Vec<Event> {
        let mut events: Vec<Event> = clusters
            .iter()
            .filter_map(|cluster| {
                let event = self.build_event(cluster)?;
                (event.hotness > 0.0).then_some(event)
            })
            .collect();

        events.sort_by(|a, b| {
            b.hotness
                .total_cmp(&a.hotness)
                .then_with(|| a.dedup_group.cmp(&b.dedup_group))
        });

        events
    }

    fn build_event(&self, cluster: &Cluster) -> Option<Event> {
        let items = &cluster.items;
        if items.is_empty() {
            return None;
        }

        let mut sources = Vec::with_capacity(items.len());
        let mut tickers: Vec<String> = Vec::new();
        let mut entities: Vec<String> = Vec::new();
        let mut ticker_set = HashSet::new();
        let mut entity_set = HashSet::new();
        let mut total_sentiment = 0.0;
        let mut negative_count = 0usize;
        let mut earliest = items[0].published();
        let mut latest = items[0].published();

        for item in items {
            sources.push(SourceRef {
                title: item.headline.clone(),
                source: item.source.clone(),
                url: item.url.clone(),
                published: item.published(),
            });
            for ticker in &item.tickers {
                let t = ticker.to_uppercase();
                if ticker_set.insert(t.clone()) {
                    tickers.push(t);
                }
            }
            for entity in &item.entities {
                if entity_set.insert(normalize_entity(entity)) {
                    entities.push(entity.clone());
                }
            }
            total_sentiment += item.sentiment.abs();
            if item.sentiment < 0.0 {
                negative_count += 1;
            }
            earliest = earliest.min(item.published());
            latest = latest.max(item.published());
        }

        tickers.sort();

        let coverage = items.len() as f64;
        let reach = tickers.len() as f64;
        let novelty = if coverage > 1.0 {
            1.0 - f64::min(0.6, (coverage - 1.0) * 0.12)
        } else {
            1.0
        };

        let window = latest - earliest;
        let velocity = if window > chrono::Duration::zero() {
            let hours = window.num_milliseconds() as f64 / 3_600_000.0;
            f64::max(0.2, f64::min(1.0, 6.0 / (hours + 1.0)))
        } else {
            1.0
        };

        let source_score = self.average_source_weight(items);
        let mut sentiment_score = f64::min(1.0, total_sentiment / coverage);
        if negative_count > 0 && negative_count == items.len() {
            sentiment_score = f64::min(1.0, sentiment_score + 0.15);
        }

        let tag_score = self.tag_weight(items);
        let breadth_score = f64::min(1.0, reach / 4.0);
        let extent_score = f64::min(1.0, entities.len() as f64 / 6.0);

        // static weights derived heuristically
        let hotness = clamp01(
            f64::min(1.0, coverage / 4.0) * 0.18
                + velocity * 0.18
                + source_score * 0.15
                + sentiment_score * 0.12
                + tag_score * 0.18
                + (0.6 * breadth_score + 0.4 * extent_score) * 0.12
                + novelty * 0.07,
        );

        let mut why_now = self.compose_why_now(coverage, reach, velocity, source_score);
        if let Some(annotations) = &cluster.annotations {
            let llm_why = bilingual(&annotations.why_now_en, &annotations.why_now_ru);
            if !llm_why.trim().is_empty() {
                why_now = if why_now.trim().is_empty() {
                    llm_why
                } else {
                    format!("{llm_why} | {why_now}")
                };
            }
        }

        let draft = build_draft(cluster, &entities, &tickers, &sources, &why_now);
        let timeline = build_timeline(cluster);

        Some(Event {
            dedup_group: cluster.id.clone(),
            headline: cluster.primary.headline.clone(),
            hotness: round_to(hotness, 3),
            why_now,
            entities,
            tickers,
            sources,
            timeline,
            draft,
        })
    }

    fn average_source_weight(&self, items: &[crate::model::NewsItem]) -> f64 {
        if items.is_empty() {
            return 0.3;
        }
        let total: f64 = items
            .iter()
            .map(|item| {
                self.source_weights
                    .get(&item.source.to_lowercase())
                    .copied()
                    .unwrap_or(0.5)
            })
            .sum();
        f64::min(1.0, total / items.len() as f64)
    }

    fn tag_weight(&self, items: &[crate::model::NewsItem]) -> f64 {
        let best = items
            .iter()
            .filter_map(|item| self.tag_weights.get(&item.importance_tag))
            .fold(0.0f64, |acc, w| acc.max(*w));
        if best == 0.0 {
            0.45
        } else {
            best
        }
    }

    fn compose_why_now(&self, coverage: f64, reach: f64, velocity: f64, source_score: f64) -> String {
        let mut notes = Vec::new();
        if coverage > 1.0 {
            notes.push(bilingual("multiple confirmations", "несколько подтверждений"));
        }
        if reach >= 2.0 {
            notes.push(bilingual("broad asset impact", "широкое влияние на активы"));
        }
        if velocity > 0.8 {
            notes.push(bilingual("fast-moving timeline", "быстро развивающийся таймлайн"));
        }
        if source_score > 0.7 {
            notes.push(bilingual(
                "high-credibility sources",
                "источники с высоким доверием",
            ));
        }
        if notes.is_empty() {
            notes.push(bilingual("fresh development", "свежее развитие событий"));
        }
        notes.join("; ")
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn round_to(v: f64, precision: u32) -> f64 {
    let p = 10f64.powi(precision as i32);
    (v * p).round() / p
}

fn normalize_entity(entity: &str) -> String {
    entity.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewsItem;
    use chrono::{TimeZone, Utc};

    fn item(id: &str, hour: u32, min: u32) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            headline: format!("headline {id}"),
            source: "Reuters".into(),
            url: format!("https://example.com/{id}"),
            published_at: Some(Utc.with_ymd_and_hms(2025, 10, 3, hour, min, 0).unwrap()),
            ..NewsItem::default()
        }
    }

    fn cluster(id: &str, items: Vec<NewsItem>) -> Cluster {
        let mut sorted = items.clone();
        sorted.sort_by_key(|i| i.published());
        Cluster {
            id: id.to_string(),
            primary: sorted[0].clone(),
            start_time: sorted[0].published(),
            end_time: sorted[sorted.len() - 1].published(),
            items,
            annotations: None,
        }
    }

    #[test]
    fn hotness_matches_the_analytic_value() {
        // Two Reuters items 1.5h apart sharing one ticker, no sentiment, no
        // tags, one entity.
        let mut a = item("n1", 8, 0);
        a.tickers = vec!["CMA".into()];
        a.entities = vec!["Company A".into()];
        let mut b = item("n2", 9, 30);
        b.tickers = vec!["CMA".into()];
        b.entities = vec!["Company A".into()];

        let scorer = Scorer::with_default_weights();
        let events = scorer.score_clusters(&[cluster("c1", vec![a, b])]);
        assert_eq!(events.len(), 1);

        // velocity: 6 / (1.5h + 1) = 2.4, capped at 1.0
        let coverage_norm = 0.5;
        let velocity = 1.0;
        let credibility = 0.88;
        let sentiment = 0.0;
        let tag = 0.45;
        let breadth = 0.6 * (1.0f64 / 4.0) + 0.4 * (1.0f64 / 6.0);
        let novelty = 1.0 - 0.12;
        let expected = coverage_norm * 0.18
            + velocity * 0.18
            + credibility * 0.15
            + sentiment * 0.12
            + tag * 0.18
            + breadth * 0.12
            + novelty * 0.07;
        let expected = (expected * 1000.0).round() / 1000.0;

        assert!((events[0].hotness - expected).abs() < 1e-9);
    }

    #[test]
    fn hotness_stays_within_unit_interval_and_three_decimals() {
        let mut items = Vec::new();
        for i in 0..8 {
            let mut it = item(&format!("n{i}"), 8, i as u32);
            it.sentiment = -3.0;
            it.importance_tag = "guidance_cut".into();
            it.tickers = (0..6).map(|t| format!("T{t}")).collect();
            it.entities = (0..8).map(|e| format!("E{e}")).collect();
            it.source = "Central Bank".into();
            items.push(it);
        }
        let scorer = Scorer::with_default_weights();
        let events = scorer.score_clusters(&[cluster("c1", items)]);
        let hotness = events[0].hotness;
        assert!((0.0..=1.0).contains(&hotness));
        assert!((hotness * 1000.0 - (hotness * 1000.0).round()).abs() < 1e-9);
    }

    #[test]
    fn all_negative_sentiment_gets_the_uplift() {
        let mut a = item("n1", 8, 0);
        a.sentiment = -0.2;
        let mut b = item("n1b", 8, 5);
        b.sentiment = -0.2;
        let mixed_a = {
            let mut it = item("n2", 8, 0);
            it.sentiment = -0.2;
            it
        };
        let mixed_b = {
            let mut it = item("n2b", 8, 5);
            it.sentiment = 0.2;
            it
        };

        let scorer = Scorer::with_default_weights();
        let negative = scorer.score_clusters(&[cluster("neg", vec![a, b])]);
        let mixed = scorer.score_clusters(&[cluster("mix", vec![mixed_a, mixed_b])]);
        // same |sentiment| mean, but the all-negative cluster gets +0.15
        let delta = negative[0].hotness - mixed[0].hotness;
        assert!((delta - 0.15 * 0.12).abs() < 1e-3);
    }

    #[test]
    fn unknown_sources_score_the_default_weight() {
        let scorer = Scorer::with_default_weights();
        let mut it = item("n1", 8, 0);
        it.source = "Totally Unknown Wire".into();
        let events = scorer.score_clusters(&[cluster("c", vec![it])]);
        assert!(events[0].hotness > 0.0);
    }

    #[test]
    fn source_lookup_is_case_insensitive() {
        let scorer = Scorer::with_default_weights();
        let mut a = item("n1", 8, 0);
        a.source = "BLOOMBERG".into();
        let mut b = item("n2", 8, 0);
        b.source = "nobody".into();
        let known = scorer.score_clusters(&[cluster("a", vec![a])]);
        let unknown = scorer.score_clusters(&[cluster("b", vec![b])]);
        assert!(known[0].hotness > unknown[0].hotness);
    }

    #[test]
    fn events_sort_by_hotness_with_id_tie_break() {
        let scorer = Scorer::with_default_weights();
        let a = cluster("zzz", vec![item("n1", 8, 0)]);
        let b = cluster("aaa", vec![item("n2", 9, 0)]);
        let events = scorer.score_clusters(&[a, b]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].hotness, events[1].hotness);
        assert_eq!(events[0].dedup_group, "aaa");
        assert_eq!(events[1].dedup_group, "zzz");
    }

    #[test]
    fn tickers_dedupe_uppercase_sorted_entities_keep_first_seen_case() {
        let mut a = item("n1", 8, 0);
        a.tickers = vec!["gld".into(), "CMA".into()];
        a.entities = vec!["Company A".into()];
        let mut b = item("n2", 8, 30);
        b.tickers = vec!["cma".into()];
        b.entities = vec!["company a".into(), "Central Bank".into()];

        let scorer = Scorer::with_default_weights();
        let events = scorer.score_clusters(&[cluster("c", vec![a, b])]);
        assert_eq!(events[0].tickers, vec!["CMA".to_string(), "GLD".to_string()]);
        assert_eq!(
            events[0].entities,
            vec!["Company A".to_string(), "Central Bank".to_string()]
        );
    }

    #[test]
    fn why_now_mentions_confirmations_and_credibility() {
        let mut a = item("n1", 8, 0);
        a.tickers = vec!["CMA".into(), "GLD".into()];
        let b = item("n2", 8, 10);
        let scorer = Scorer::with_default_weights();
        let events = scorer.score_clusters(&[cluster("c", vec![a, b])]);
        let why = &events[0].why_now;
        assert!(why.contains("multiple confirmations / несколько подтверждений"));
        assert!(why.contains("broad asset impact"));
        assert!(why.contains("fast-moving timeline"));
        assert!(why.contains("high-credibility sources"));
    }

    #[test]
    fn annotation_why_now_is_prepended() {
        use crate::cluster::ClusterAnnotations;
        let mut c = cluster("c", vec![item("n1", 8, 0)]);
        c.annotations = Some(ClusterAnnotations {
            why_now_en: "Guidance cut confirmed".into(),
            why_now_ru: "Снижение прогноза".into(),
            ..ClusterAnnotations::default()
        });
        let scorer = Scorer::with_default_weights();
        let events = scorer.score_clusters(&[c]);
        assert!(events[0]
            .why_now
            .starts_with("Guidance cut confirmed / Снижение прогноза | "));
    }
}
