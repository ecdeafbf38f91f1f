//! Search-trend context for the prompt.
//!
//! Reads an optional `trends.json` snapshot (produced by a separate
//! fetcher job) and renders a short, bounded text block. Every part of
//! the snapshot is optional; a missing or unreadable file simply means
//! no trends block.
//!
//! ```json
//! {
//!   "generated_at_utc": "2026-10-19T06:00:00+00:00",
//!   "trending_searches": { "BR": ["..."], "US": ["..."] },
//!   "related_queries": { "react": { "BR": { "rising": [], "top": [] } } },
//!   "suggestions": { "react": ["React", "React Native"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const MAX_TRENDING_PER_GEO: usize = 10;
const MAX_RELATED_PER_TERM: usize = 5;
const MAX_SUGGESTIONS_PER_TERM: usize = 5;
/// Hard cap on the rendered block.
pub const MAX_TRENDS_CHARS: usize = 2500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrendsSnapshot {
    pub generated_at_utc: Option<String>,
    pub trending_searches: BTreeMap<String, Vec<String>>,
    pub related_queries: BTreeMap<String, BTreeMap<String, RelatedQueries>>,
    pub suggestions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelatedQueries {
    pub rising: Vec<String>,
    pub top: Vec<String>,
}

/// What the debug bundle records about the trends used in a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendsPreview {
    pub generated_at_utc: Option<String>,
    pub trending_count: usize,
    pub related_terms: usize,
    pub suggestion_terms: usize,
    pub summary: String,
}

impl TrendsSnapshot {
    pub fn item_count(&self) -> usize {
        let trending: usize = self.trending_searches.values().map(Vec::len).sum();
        let related: usize = self
            .related_queries
            .values()
            .flat_map(|geos| geos.values())
            .map(|rq| rq.rising.len() + rq.top.len())
            .sum();
        let suggestions: usize = self.suggestions.values().map(Vec::len).sum();
        trending + related + suggestions
    }

    pub fn preview(&self, summary: &str) -> TrendsPreview {
        TrendsPreview {
            generated_at_utc: self.generated_at_utc.clone(),
            trending_count: self.trending_searches.values().map(Vec::len).sum(),
            related_terms: self.related_queries.len(),
            suggestion_terms: self.suggestions.len(),
            summary: summary.to_string(),
        }
    }
}

/// Load the snapshot. Absent or malformed files yield `None`.
pub fn load_trends(path: &Path) -> Option<TrendsSnapshot> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            tracing::debug!(path = %path.display(), "trends_skip");
            return None;
        }
    };
    match serde_json::from_str::<TrendsSnapshot>(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "trends_invalid_json");
            None
        }
    }
}

/// Render the snapshot as prompt text, or `None` when it holds nothing.
pub fn render_trends(snapshot: &TrendsSnapshot) -> Option<String> {
    if snapshot.item_count() == 0 {
        return None;
    }

    let mut lines = Vec::new();
    if let Some(ts) = &snapshot.generated_at_utc {
        lines.push(format!("Snapshot: {}", ts));
    }

    for (geo, terms) in &snapshot.trending_searches {
        let terms = non_empty(terms, MAX_TRENDING_PER_GEO);
        if !terms.is_empty() {
            lines.push(format!("Trending searches ({}): {}", geo, terms.join(", ")));
        }
    }

    for (term, geos) in &snapshot.related_queries {
        for (geo, rq) in geos {
            let source = if rq.rising.is_empty() { &rq.top } else { &rq.rising };
            let queries = non_empty(source, MAX_RELATED_PER_TERM);
            if !queries.is_empty() {
                lines.push(format!(
                    "Related to \"{}\" ({}): {}",
                    term,
                    geo,
                    queries.join(", ")
                ));
            }
        }
    }

    for (term, items) in &snapshot.suggestions {
        let items = non_empty(items, MAX_SUGGESTIONS_PER_TERM);
        if !items.is_empty() {
            lines.push(format!("Suggestions for \"{}\": {}", term, items.join(", ")));
        }
    }

    Some(cap_lines(&lines, MAX_TRENDS_CHARS))
}

fn non_empty(items: &[String], max: usize) -> Vec<&str> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(max)
        .collect()
}

/// Join lines, stopping before the line that would exceed `max_chars`.
fn cap_lines(lines: &[String], max_chars: usize) -> String {
    let mut out = String::new();
    for line in lines {
        let extra = line.chars().count() + usize::from(!out.is_empty());
        if out.chars().count() + extra > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}
