//! Prompt assembly for the generation call.
//!
//! [`build_prompt`] is pure: identical inputs give an identical prompt.
//! Blocks appear in a fixed order:
//!
//! 1. trends context (optional)
//! 2. persona paragraph
//! 3. target category and its description
//! 4. recent items (only when non-empty)
//! 5. last-N-days exclusions (only when non-empty)
//! 6. numbered authoring rules
//! 7. the exact output shape

use crate::config::LabelSpec;
use crate::models::{RecentEntry, RepetitionWindow};

const PERSONA: &str = "You are a YouTube content strategist for a channel about building an \
international software career from Brazil (BR -> abroad) and about frontend engineering. \
The audience is Brazilian developers, from juniors to seniors, who want to work for foreign \
companies.";

/// The JSON shape the model must return, field names and nesting verbatim.
pub const OUTPUT_SHAPE: &str = r#"{
  "video_type": "",
  "audience": "",
  "goal": "",
  "title_options": ["", "", ""],
  "chosen_title": "",
  "thumbnail": {
    "concepts": [
      {"visual":"", "text":"", "emotion":""},
      {"visual":"", "text":"", "emotion":""},
      {"visual":"", "text":"", "emotion":""}
    ],
    "chosen": {"visual":"", "text":"", "emotion":""}
  },
  "hook_0_10s": "",
  "outline": [
    {"t":"0:00-0:45", "topic":""},
    {"t":"0:45-2:00", "topic":""},
    {"t":"2:00-4:00", "topic":""},
    {"t":"4:00-7:00", "topic":""},
    {"t":"7:00-9:00", "topic":""}
  ],
  "full_script": "",
  "description": "",
  "tags": ["", "", ""],
  "cta": "",
  "why_today": ""
}"#;

/// Everything the prompt depends on.
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub label: &'a LabelSpec,
    pub recent: &'a [RecentEntry],
    pub window: &'a RepetitionWindow,
    pub trends: Option<&'a str>,
    pub language: &'a str,
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(trends) = input.trends.filter(|t| !t.trim().is_empty()) {
        blocks.push(format!(
            "SEARCH TRENDS CONTEXT (use only if relevant to the category; never force it):\n{}",
            trends.trim()
        ));
    }

    blocks.push(PERSONA.to_string());

    let mut target = format!(
        "Generate ONE complete video package.\nTarget category: \"{}\"",
        input.label.name
    );
    if !input.label.description.trim().is_empty() {
        target.push_str(&format!("\nCategory context: {}", input.label.description.trim()));
    }
    blocks.push(target);

    if !input.recent.is_empty() {
        blocks.push(recent_block(input.recent));
    }

    if !input.window.is_empty() {
        blocks.push(window_block(input.window));
    }

    blocks.push(format!(
        "RULES:\n\
         1. Reply ONLY with valid JSON, no markdown.\n\
         2. Write every field in {}.\n\
         3. Target length: 6 to 10 minutes.\n\
         4. Set \"video_type\" to exactly \"{}\".\n\
         5. Pick \"chosen_title\" from \"title_options\".\n\
         6. \"why_today\" explains in one or two sentences why this topic fits today.",
        input.language, input.label.name
    ));

    blocks.push(format!("EXACT FORMAT:\n{}", OUTPUT_SHAPE));
    blocks.push("Now generate ONLY the JSON.".to_string());

    blocks.join("\n\n")
}

fn recent_block(recent: &[RecentEntry]) -> String {
    let lines: Vec<String> = recent
        .iter()
        .map(|r| format!("- \"{}\" | {}", r.title, r.tags.join(", ")))
        .collect();
    format!(
        "LATEST TITLES/TAGS (do not repeat similar topics):\n{}\n\nDo not repeat topics or titles similar to the last {}.",
        lines.join("\n"),
        recent.len()
    )
}

fn window_block(window: &RepetitionWindow) -> String {
    let mut parts = vec![format!("USED IN THE LAST {} DAYS (avoid):", window.days)];
    if !window.titles.is_empty() {
        parts.push("Titles:".to_string());
        parts.extend(window.titles.iter().map(|t| format!("- {}", t)));
    }
    if !window.labels.is_empty() {
        parts.push(format!(
            "Categories: {}",
            window.labels.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !window.tags.is_empty() {
        parts.push(format!(
            "Tags: {}",
            window.tags.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    parts.join("\n")
}
