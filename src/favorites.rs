//! Favorite-append and weekly-digest jobs.
//!
//! Favorites arrive as issues opened from the link in the daily email.
//! `append_favorite` turns one issue into a markdown block in the weekly
//! log; `run_digest` mails the week's blocks, moves them into the
//! archive and resets the log to its header.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::EmailCredentials;
use crate::mail::{EmailMessage, Mailer};

pub const WEEKLY_FILE: &str = "favorites-weekly.md";
pub const ARCHIVE_FILE: &str = "favorites-archive.md";
/// Title, blank, subtitle, blank.
pub const HEADER_LINES: usize = 4;
pub const FAVORITE_MARKER: &str = "## ⭐";
pub const DIGEST_SUBJECT: &str = "⭐ Weekly Favorites Report";

const WEEKLY_HEADER: &str = "# Weekly favorites\n\nIdeas starred from the daily email this week.\n\n";
const NO_RESPONSE: &str = "_No response_";
const TITLE_PREFIX: &str = "favorite:";

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^###\s*(.*?)\s*$").unwrap())
}

pub fn weekly_path(dir: &Path) -> PathBuf {
    dir.join(WEEKLY_FILE)
}

pub fn archive_path(dir: &Path) -> PathBuf {
    dir.join(ARCHIVE_FILE)
}

/// Fields read from the issue form body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub idea_title: String,
    pub summary: String,
}

/// Split an issue-form body into `### Heading` sections and pick the
/// "Idea title" section and the first "Short summary…" section.
pub fn parse_form_body(body: &str) -> FormFields {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in body.lines() {
        if let Some(caps) = heading_re().captures(line) {
            sections.push((caps[1].to_lowercase(), Vec::new()));
        } else if let Some((_, content)) = sections.last_mut() {
            content.push(line);
        }
    }

    let text = |lines: &[&str]| {
        let joined = lines.join("\n");
        let trimmed = joined.trim();
        if trimmed == NO_RESPONSE {
            String::new()
        } else {
            trimmed.to_string()
        }
    };

    let mut fields = FormFields::default();
    if let Some((_, lines)) = sections.iter().find(|(h, _)| h == "idea title") {
        fields.idea_title = text(lines.as_slice());
    }
    if let Some((_, lines)) = sections.iter().find(|(h, _)| h.starts_with("short summary")) {
        fields.summary = text(lines.as_slice());
    }
    fields
}

/// One appended favorite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteEntry {
    pub title: String,
    pub saved_at: String,
    pub issue_url: String,
    pub notes: String,
}

impl FavoriteEntry {
    pub fn from_issue(
        issue_title: &str,
        issue_body: &str,
        issue_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let form = parse_form_body(issue_body);
        let title = if !form.idea_title.is_empty() {
            form.idea_title
        } else {
            let fallback = strip_prefix_ci(issue_title.trim(), TITLE_PREFIX).trim();
            if fallback.is_empty() {
                "Untitled".to_string()
            } else {
                fallback.to_string()
            }
        };
        let notes = if form.summary.is_empty() {
            "-".to_string()
        } else {
            form.summary
        };

        Self {
            title,
            saved_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            issue_url: issue_url.to_string(),
            notes,
        }
    }

    pub fn to_markdown(&self) -> String {
        format!(
            "\n{} {}\n- Saved at: {}\n- Issue: {}\n- Notes: {}\n",
            FAVORITE_MARKER, self.title, self.saved_at, self.issue_url, self.notes
        )
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

/// Append one favorite to the weekly log, creating the directory and the
/// log (with its header) when missing.
pub fn append_favorite(
    dir: &Path,
    issue_title: &str,
    issue_body: &str,
    issue_url: &str,
    now: DateTime<Utc>,
) -> Result<FavoriteEntry> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create favorites dir: {}", dir.display()))?;

    let path = weekly_path(dir);
    let entry = FavoriteEntry::from_issue(issue_title, issue_body, issue_url, now);

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open weekly log: {}", path.display()))?;
    if file.metadata()?.len() == 0 {
        file.write_all(WEEKLY_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;

    tracing::info!(title = %entry.title, path = %path.display(), "favorite_appended");
    Ok(entry)
}

/// A weekly log split into its header and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyLog {
    pub header: String,
    pub body: String,
}

impl WeeklyLog {
    pub fn parse(raw: &str) -> Self {
        let lines: Vec<&str> = raw.split('\n').collect();
        let cut = lines.len().min(HEADER_LINES);
        Self {
            header: lines[..cut].join("\n"),
            body: lines[cut..].join("\n").trim().to_string(),
        }
    }

    pub fn has_favorites(&self) -> bool {
        !self.body.is_empty() && self.body.contains(FAVORITE_MARKER)
    }

    pub fn entry_count(&self) -> usize {
        self.body.matches(FAVORITE_MARKER).count()
    }
}

pub fn digest_html(body: &str) -> String {
    format!(
        r#"<div style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; max-width: 640px;">
<h1 style="font-size:1.4em;">{}</h1>
<pre style="white-space: pre-wrap; background: #f6f6f6; padding: 16px; border-radius: 8px;">{}</pre>
</div>"#,
        DIGEST_SUBJECT,
        html_escape::encode_text(body)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    /// No weekly log on disk.
    NoLog,
    /// The log holds only its header.
    Empty,
    Sent { entries: usize },
}

/// Mail the week's favorites, archive them and reset the weekly log.
///
/// Files are only touched after a successful send.
pub async fn run_digest(
    dir: &Path,
    mailer: &dyn Mailer,
    email: &EmailCredentials,
    now: DateTime<Utc>,
) -> Result<DigestOutcome> {
    let weekly = weekly_path(dir);
    let raw = match std::fs::read_to_string(&weekly) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %weekly.display(), "digest_skip_no_log");
            return Ok(DigestOutcome::NoLog);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read weekly log: {}", weekly.display()));
        }
    };

    let log = WeeklyLog::parse(&raw);
    if !log.has_favorites() {
        tracing::info!("digest_skip_empty");
        return Ok(DigestOutcome::Empty);
    }

    let message = EmailMessage {
        from: email.email_from.clone(),
        to: email.email_to.clone(),
        subject: DIGEST_SUBJECT.to_string(),
        html: digest_html(&log.body),
    };
    mailer.send(&message).await?;

    let archive = archive_path(dir);
    let section = format!("## Week of {}\n\n{}\n\n", now.format("%Y-%m-%d"), log.body);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    file.write_all(section.as_bytes())?;

    std::fs::write(&weekly, format!("{}\n", log.header))
        .with_context(|| format!("Failed to reset weekly log: {}", weekly.display()))?;

    let entries = log.entry_count();
    tracing::info!(entries, "digest_sent");
    Ok(DigestOutcome::Sent { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    const FORM: &str = "### Idea title\n\nGrid vs Flexbox\n\n### Short summary (optional)\n\nGood for a short.\nTwo lines.\n\n### Anything else?\n\n_No response_";

    #[test]
    fn test_parse_form_body() {
        let fields = parse_form_body(FORM);
        assert_eq!(fields.idea_title, "Grid vs Flexbox");
        assert_eq!(fields.summary, "Good for a short.\nTwo lines.");
    }

    #[test]
    fn test_parse_form_no_response_is_empty() {
        let fields = parse_form_body(
            "### Idea title\n\n_No response_\n\n### Short summary\n\n_No response_",
        );
        assert_eq!(fields, FormFields::default());
        assert_eq!(parse_form_body(""), FormFields::default());
    }

    #[test]
    fn test_entry_fallbacks() {
        let entry = FavoriteEntry::from_issue("FAVORITE: CSS tricks", "", "https://x/1", now());
        assert_eq!(entry.title, "CSS tricks");
        assert_eq!(entry.notes, "-");

        let entry = FavoriteEntry::from_issue("Favorite:", "", "u", now());
        assert_eq!(entry.title, "Untitled");

        let entry = FavoriteEntry::from_issue("Favorite: ignored", FORM, "u", now());
        assert_eq!(entry.title, "Grid vs Flexbox");
    }

    #[test]
    fn test_block_shape() {
        let entry = FavoriteEntry::from_issue("Favorite: A", "", "https://x/1", now());
        assert_eq!(
            entry.to_markdown(),
            "\n## ⭐ A\n- Saved at: 2026-10-19T12:00:00.000Z\n- Issue: https://x/1\n- Notes: -\n"
        );
    }

    #[test]
    fn test_append_writes_header_once() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("favorites");
        append_favorite(&dir, "Favorite: A", "", "u1", now()).unwrap();
        append_favorite(&dir, "Favorite: B", "", "u2", now()).unwrap();

        let raw = std::fs::read_to_string(weekly_path(&dir)).unwrap();
        assert!(raw.starts_with(WEEKLY_HEADER));
        assert_eq!(raw.matches("# Weekly favorites").count(), 1);

        let log = WeeklyLog::parse(&raw);
        assert_eq!(Some(log.header.as_str()), WEEKLY_HEADER.strip_suffix('\n'));
        assert_eq!(format!("{}\n", log.header), WEEKLY_HEADER);
        assert_eq!(log.entry_count(), 2);
        assert!(log.body.starts_with("## ⭐ A"));
    }

    #[test]
    fn test_header_only_log_has_no_favorites() {
        let log = WeeklyLog::parse(WEEKLY_HEADER);
        assert!(!log.has_favorites());
        assert!(log.body.is_empty());

        let log = WeeklyLog::parse("# t\n\nsub\n\nsome stray note");
        assert!(!log.has_favorites());
    }

    #[test]
    fn test_digest_html_escapes_body() {
        let html = digest_html("## ⭐ <b>x</b> & y");
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt; &amp; y"));
        assert!(html.contains(DIGEST_SUBJECT));
    }
}
