//! Timeline synthesis: ordered cluster updates with bilingual labels.

use crate::cluster::Cluster;
use crate::localize::bilingual;
use crate::model::TimelineEntry;

/// First entry is "Initial", the last "Latest", everything in between
/// "Update i" (1-based). Entries ascend by timestamp.
pub fn build_timeline(cluster: &Cluster) -> Vec<TimelineEntry> {
    if cluster.items.is_empty() {
        return Vec::new();
    }

    let mut items = cluster.items.clone();
    items.sort_by_key(|item| item.published());

    let last = items.len() - 1;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let label = if idx == 0 {
                bilingual("Initial", "Старт")
            } else if idx == last {
                bilingual("Latest", "Финал")
            } else {
                bilingual(&format!("Update {idx}"), &format!("Обновление {idx}"))
            };
            TimelineEntry {
                label,
                source: item.source.clone(),
                url: item.url.clone(),
                timestamp: item.published(),
            }
        })
        .collect()
}
