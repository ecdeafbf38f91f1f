//! Per-run context and the local debug bundle.
//!
//! [`RunContext`] is created by the caller and passed by `&mut` through
//! the pipeline; nothing about a run lives in process-wide state.
//! [`write_bundle`] drops the operator-facing artifacts into the debug
//! directory at the end of every run, successful or not:
//!
//! | File | Content |
//! |------|---------|
//! | `last-run.json` | run id, timings, model, label, success, env var names |
//! | `last-response-preview.txt` | head of the last raw model response |
//! | `last-payload.json` | parsed payload, script truncated |
//! | `trends-preview.json` | the trends summary used in the prompt |
//! | `summary.md` | human-readable outcome |

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::preview;
use crate::models::IdeaDocument;
use crate::trends::TrendsPreview;

pub const PREVIEW_CHARS: usize = 1200;
pub const FULL_SCRIPT_TRUNCATE: usize = 3000;
const TRUNCATION_MARKER: &str = "\n\n[... truncated]";

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    pub model: String,
    pub label: Option<String>,
    pub llm_time: Duration,
    pub mail_time: Duration,
    pub raw_response: Option<String>,
    pub trends_preview: Option<TrendsPreview>,
    pub env_present: Vec<String>,
}

impl RunContext {
    pub fn new(model: &str, env_present: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            started_at: Utc::now(),
            model: model.to_string(),
            label: None,
            llm_time: Duration::ZERO,
            mail_time: Duration::ZERO,
            raw_response: None,
            trends_preview: None,
            env_present,
        }
    }

    pub fn total_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// How a run ended, as far as the bundle cares.
pub enum RunOutcome<'a> {
    Succeeded {
        payload: &'a Map<String, Value>,
        idea: &'a IdeaDocument,
    },
    Failed {
        message: &'a str,
    },
}

impl RunOutcome<'_> {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LastRun<'a> {
    run_id: String,
    timestamp: String,
    total_ms: u128,
    llm_ms: u128,
    mail_ms: u128,
    model: &'a str,
    label: Option<&'a str>,
    success: bool,
    env_vars_present: &'a [String],
}

/// The payload with an oversized `full_script` cut down.
pub fn safe_payload(payload: &Map<String, Value>) -> Map<String, Value> {
    let mut safe = payload.clone();
    if let Some(Value::String(script)) = safe.get("full_script") {
        if script.chars().count() > FULL_SCRIPT_TRUNCATE {
            let cut = format!("{}{}", preview(script, FULL_SCRIPT_TRUNCATE), TRUNCATION_MARKER);
            safe.insert("full_script".to_string(), Value::String(cut));
        }
    }
    safe
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "—"
    } else {
        s
    }
}

pub fn render_summary(ctx: &RunContext, outcome: &RunOutcome<'_>) -> String {
    let headline = if outcome.is_success() {
        "## ✅ Daily video idea: success"
    } else {
        "## ❌ Daily video idea: failure"
    };
    let mut lines = vec![
        headline.to_string(),
        String::new(),
        format!("- **Run ID:** `{}`", ctx.run_id),
        format!("- **Total:** {} ms", ctx.total_ms()),
        format!("- **LLM:** {} ms", ctx.llm_time.as_millis()),
        format!("- **Email:** {} ms", ctx.mail_time.as_millis()),
        format!("- **Model:** {}", or_dash(&ctx.model)),
    ];
    match outcome {
        RunOutcome::Succeeded { idea, .. } => {
            lines.push(String::new());
            lines.push(format!("- **Title:** {}", or_dash(&idea.chosen_title)));
            lines.push(format!("- **Type:** {}", or_dash(&idea.video_type)));
        }
        RunOutcome::Failed { message } => {
            lines.push(String::new());
            lines.push("### Error".to_string());
            lines.push("```".to_string());
            lines.push(message.to_string());
            lines.push("```".to_string());
        }
    }
    lines.join("\n")
}

/// Write every bundle file into `dir`, creating it when missing.
pub fn write_bundle(dir: &Path, ctx: &RunContext, outcome: &RunOutcome<'_>) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create debug dir: {}", dir.display()))?;

    let last_run = LastRun {
        run_id: ctx.run_id.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        total_ms: ctx.total_ms(),
        llm_ms: ctx.llm_time.as_millis(),
        mail_ms: ctx.mail_time.as_millis(),
        model: &ctx.model,
        label: ctx.label.as_deref(),
        success: outcome.is_success(),
        env_vars_present: &ctx.env_present,
    };
    std::fs::write(
        dir.join("last-run.json"),
        serde_json::to_string_pretty(&last_run)?,
    )?;

    if let Some(raw) = &ctx.raw_response {
        std::fs::write(
            dir.join("last-response-preview.txt"),
            preview(raw, PREVIEW_CHARS),
        )?;
    }

    if let RunOutcome::Succeeded { payload, .. } = outcome {
        std::fs::write(
            dir.join("last-payload.json"),
            serde_json::to_string_pretty(&safe_payload(payload))?,
        )?;
    }

    if let Some(trends) = &ctx.trends_preview {
        std::fs::write(
            dir.join("trends-preview.json"),
            serde_json::to_string_pretty(trends)?,
        )?;
    }

    std::fs::write(dir.join("summary.md"), render_summary(ctx, outcome))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_failure_bundle() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = RunContext::new("llama", vec!["GROQ_API_KEY".to_string()]);
        ctx.raw_response = Some("r".repeat(5000));

        write_bundle(
            tmp.path(),
            &ctx,
            &RunOutcome::Failed {
                message: "missing required environment variable: EMAIL_TO",
            },
        )
        .unwrap();

        let summary = std::fs::read_to_string(tmp.path().join("summary.md")).unwrap();
        assert!(summary.starts_with("## ❌"));
        assert!(summary.contains(&ctx.run_id.to_string()));
        assert!(summary.contains("```\nmissing required environment variable: EMAIL_TO\n```"));

        let preview =
            std::fs::read_to_string(tmp.path().join("last-response-preview.txt")).unwrap();
        assert_eq!(preview.len(), PREVIEW_CHARS);

        let raw = std::fs::read_to_string(tmp.path().join("last-run.json")).unwrap();
        let last_run: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(last_run["success"], false);
        assert_eq!(last_run["envVarsPresent"], json!(["GROQ_API_KEY"]));
        assert!(!tmp.path().join("last-payload.json").exists());
        assert!(!tmp.path().join("trends-preview.json").exists());
    }

    #[test]
    fn test_success_bundle_truncates_script() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("debug");
        let mut ctx = RunContext::new("llama", Vec::new());
        ctx.label = Some("tech".to_string());

        let payload = json!({
            "chosen_title": "T",
            "video_type": "tech",
            "full_script": "s".repeat(4000)
        });
        let payload = payload.as_object().unwrap();
        let idea = IdeaDocument::from_payload(payload);
        write_bundle(&dir, &ctx, &RunOutcome::Succeeded { payload, idea: &idea }).unwrap();

        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("last-payload.json")).unwrap())
                .unwrap();
        let script = saved["full_script"].as_str().unwrap();
        assert!(script.ends_with(TRUNCATION_MARKER));
        assert_eq!(script.len(), FULL_SCRIPT_TRUNCATE + TRUNCATION_MARKER.len());

        let summary = std::fs::read_to_string(dir.join("summary.md")).unwrap();
        assert!(summary.contains("- **Title:** T"));
        assert!(summary.contains("- **Type:** tech"));
    }

    #[test]
    fn test_short_script_untouched() {
        let payload = json!({"full_script": "short"});
        let safe = safe_payload(payload.as_object().unwrap());
        assert_eq!(safe["full_script"], "short");
    }
}
