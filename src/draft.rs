//! Draft synthesis: title, lead, bullets, and a quote for each event.

use crate::cluster::Cluster;
use crate::localize::bilingual;
use crate::model::{Draft, SourceRef};

const LEAD_MAX_CHARS: usize = 240;

pub fn build_draft(
    cluster: &Cluster,
    entities: &[String],
    tickers: &[String],
    sources: &[SourceRef],
    why_now: &str,
) -> Draft {
    let primary = &cluster.primary;

    let mut bullets = Vec::with_capacity(3);
    if !entities.is_empty() {
        bullets.push(format!(
            "{}: {}",
            bilingual("Impacts", "Влияние"),
            entities.join(", ")
        ));
    }
    if !tickers.is_empty() {
        bullets.push(format!(
            "{}: {}",
            bilingual("Tickers in focus", "Ключевые тикеры"),
            tickers.join(", ")
        ));
    }
    bullets.push(format!(
        "{}: {why_now}",
        bilingual("Why now", "Почему сейчас")
    ));

    let mut lead = primary.summary.clone();
    if lead.trim().is_empty() {
        lead = truncate(&primary.body, LEAD_MAX_CHARS);
    }
    if let Some(annotations) = &cluster.annotations {
        let llm_lead = bilingual(&annotations.summary_en, &annotations.summary_ru);
        if !llm_lead.trim().is_empty() {
            lead = llm_lead;
        }
    }

    Draft {
        title: primary.headline.clone(),
        lead,
        bullets,
        quote: select_quote(sources),
    }
}

/// Quote the earliest source as `source — headline`.
fn select_quote(sources: &[SourceRef]) -> String {
    sources
        .iter()
        .min_by_key(|s| s.published)
        .map(|s| format!("{} — {}", s.source, s.title))
        .unwrap_or_default()
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return text.to_string();
    }
    let cut: String = chars[..max].iter().collect();
    format!("{}…", cut.trim())
}
