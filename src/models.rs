//! Core data types that flow through a daily run.
//!
//! [`HistoryItem`] and [`HistoryDocument`] mirror the JSON kept in the
//! history store, so their serialized field names stay stable. The
//! [`IdeaDocument`] is read leniently from whatever the model returned:
//! every field is optional and degrades to an empty value.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Schema version written into every history document.
pub const HISTORY_VERSION: u32 = 1;

/// One past generation, as persisted in the history store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// RFC 3339 instant. Kept as text: older entries may be malformed
    /// and the repetition guard must tolerate that.
    #[serde(default)]
    pub ts: String,
    #[serde(default, rename = "video_type")]
    pub label: String,
    #[serde(default, rename = "chosen_title")]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hook: String,
    #[serde(default, rename = "why_today")]
    pub rationale: String,
}

impl HistoryItem {
    /// Project a generated idea into a history record stamped with `now`.
    pub fn from_idea(idea: &IdeaDocument, now: DateTime<Utc>) -> Self {
        Self {
            ts: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            label: idea.video_type.clone(),
            title: idea.chosen_title.clone(),
            tags: idea.tags.clone(),
            hook: idea.hook.clone(),
            rationale: idea.why_today.clone(),
        }
    }

    /// Parsed timestamp, or `None` when missing or malformed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.ts.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Decode one list entry; anything that is not an object is rejected.
    /// Fields of the wrong type fall back to their defaults.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            ts: text_field(obj, "ts"),
            label: text_field(obj, "video_type"),
            title: text_field(obj, "chosen_title"),
            tags: list_field(obj, "tags"),
            hook: text_field(obj, "hook"),
            rationale: text_field(obj, "why_today"),
        })
    }
}

/// The full history: newest item first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub version: u32,
    pub items: Vec<HistoryItem>,
    /// Backend handle (the tracker issue number). Never serialized.
    #[serde(skip)]
    pub issue_number: Option<u64>,
}

impl Default for HistoryDocument {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            items: Vec::new(),
            issue_number: None,
        }
    }
}

/// Why a stored body could not be used as a history document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDecodeError {
    InvalidJson,
    MissingItems,
}

impl HistoryDocument {
    pub fn empty_with_issue(issue_number: Option<u64>) -> Self {
        Self {
            issue_number,
            ..Self::default()
        }
    }

    /// Decode a stored body. The body must be JSON with an `items` array;
    /// individual entries are decoded leniently.
    pub fn parse(body: &str) -> Result<Self, HistoryDecodeError> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| HistoryDecodeError::InvalidJson)?;
        let items = value
            .get("items")
            .and_then(Value::as_array)
            .ok_or(HistoryDecodeError::MissingItems)?;
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(HISTORY_VERSION);

        Ok(Self {
            version,
            items: items.iter().filter_map(HistoryItem::from_value).collect(),
            issue_number: None,
        })
    }

    /// A copy with `item` prepended and the list cut to `max_items`.
    pub fn with_item(&self, item: HistoryItem, max_items: usize) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(item);
        items.extend(self.items.iter().cloned());
        items.truncate(max_items);
        Self {
            version: HISTORY_VERSION,
            items,
            issue_number: self.issue_number,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"version":1,"items":[]}"#.to_string())
    }
}

/// Titles, labels and tags used inside the trailing window. Derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepetitionWindow {
    pub days: i64,
    pub titles: BTreeSet<String>,
    pub labels: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl RepetitionWindow {
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.labels.is_empty() && self.tags.is_empty()
    }
}

/// A title and its tags, as shown in the "recent items" prompt block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEntry {
    pub title: String,
    pub tags: Vec<String>,
}

impl From<&HistoryItem> for RecentEntry {
    fn from(item: &HistoryItem) -> Self {
        Self {
            title: item.title.clone(),
            tags: item.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailConcept {
    pub visual: String,
    pub text: String,
    pub emotion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineSegment {
    /// Time range, e.g. `0:45-2:00`.
    pub t: String,
    pub topic: String,
}

/// The generated idea package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaDocument {
    pub video_type: String,
    pub audience: String,
    pub goal: String,
    pub title_options: Vec<String>,
    pub chosen_title: String,
    pub thumbnail_concepts: Vec<ThumbnailConcept>,
    pub thumbnail_chosen: ThumbnailConcept,
    pub hook: String,
    pub outline: Vec<OutlineSegment>,
    pub full_script: String,
    pub description: String,
    pub tags: Vec<String>,
    pub cta: String,
    pub why_today: String,
}

impl IdeaDocument {
    /// Read an idea from the model's JSON object. Never fails.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let thumbnail = payload.get("thumbnail").and_then(Value::as_object);
        let concepts = thumbnail
            .and_then(|t| t.get("concepts"))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_object).map(concept).collect())
            .unwrap_or_default();
        let chosen = thumbnail
            .and_then(|t| t.get("chosen"))
            .and_then(Value::as_object)
            .map(concept)
            .unwrap_or_default();

        let outline = payload
            .get("outline")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_object)
                    .map(|o| OutlineSegment {
                        t: text_field(o, "t"),
                        topic: text_field(o, "topic"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            video_type: text_field(payload, "video_type"),
            audience: text_field(payload, "audience"),
            goal: text_field(payload, "goal"),
            title_options: list_field(payload, "title_options"),
            chosen_title: text_field(payload, "chosen_title"),
            thumbnail_concepts: concepts,
            thumbnail_chosen: chosen,
            hook: text_field(payload, "hook_0_10s"),
            outline,
            full_script: text_field(payload, "full_script"),
            description: text_field(payload, "description"),
            tags: list_field(payload, "tags"),
            cta: text_field(payload, "cta"),
            why_today: text_field(payload, "why_today"),
        }
    }
}

fn concept(obj: &Map<String, Value>) -> ThumbnailConcept {
    ThumbnailConcept {
        visual: text_field(obj, "visual"),
        text: text_field(obj, "text"),
        emotion: text_field(obj, "emotion"),
    }
}

/// Strings as-is, numbers and bools stringified, anything else empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(value_text).unwrap_or_default()
}

/// An array of scalars, or a comma-separated string.
fn list_field(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(arr)) => arr
            .iter()
            .map(value_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
