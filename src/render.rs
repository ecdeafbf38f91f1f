//! HTML email rendering.
//!
//! Pure: no I/O. Every model-controlled string goes through
//! `html_escape` before it lands in the markup.

use html_escape::{encode_double_quoted_attribute, encode_text};
use reqwest::Url;

use crate::models::IdeaDocument;

const PLACEHOLDER: &str = "—";
const TARGET_DURATION: &str = "6–10 min";

/// Where the "favorite this idea" link points.
#[derive(Debug, Clone)]
pub struct FavoriteLink {
    pub web_base: String,
    /// `owner/name`.
    pub repo: String,
    pub template: String,
}

impl FavoriteLink {
    /// Issue-creation form URL pre-filled with `title`.
    pub fn url(&self, title: &str) -> Option<Url> {
        let base = format!(
            "{}/{}/issues/new",
            self.web_base.trim_end_matches('/'),
            self.repo
        );
        let issue_title = format!("Favorite: {}", title);
        Url::parse_with_params(
            &base,
            &[
                ("template", self.template.as_str()),
                ("title", issue_title.as_str()),
                ("idea_title", title),
                ("labels", "favorite"),
            ],
        )
        .ok()
    }
}

pub fn email_subject(idea: &IdeaDocument) -> String {
    format!(
        "Video idea ({}) - {}",
        or_placeholder(&idea.video_type),
        or_placeholder(&idea.chosen_title)
    )
}

fn or_placeholder(s: &str) -> &str {
    if s.trim().is_empty() {
        PLACEHOLDER
    } else {
        s
    }
}

fn esc(s: &str) -> String {
    encode_text(or_placeholder(s)).into_owned()
}

fn block(heading: &str, id: &str, content: &str) -> String {
    format!(
        r#"<div style="margin:16px 0; padding:14px; background:#f8f9fa; border-radius:8px; border-left:4px solid #0d6efd;">
<h3 id="{id}" style="margin:0 0 8px 0; font-size:1.1em;">{heading}</h3>
{content}
</div>"#
    )
}

fn collapsed(summary: &str, body: &str) -> String {
    format!(
        r#"<details style="margin:0;"><summary style="cursor:pointer;">{summary}</summary><pre style="white-space:pre-wrap; background:#fff; padding:12px; border-radius:6px; margin:8px 0 0 0; font-size:0.9em;">{}</pre></details>"#,
        esc(body)
    )
}

/// Render the idea as an email body.
///
/// Section order: headline, summary, navigation, hook, outline,
/// thumbnail, script, description, tags and CTA, favorite link.
pub fn render(idea: &IdeaDocument, favorite: Option<&FavoriteLink>) -> String {
    let headline = format!(
        r#"<h1 style="font-size:1.5em; margin:0 0 12px 0; line-height:1.3;">🎬 {}</h1>
<p style="margin:0; color:#495057;"><b>Why today:</b> {}</p>"#,
        esc(&idea.chosen_title),
        esc(&idea.why_today)
    );

    let points: String = idea
        .outline
        .iter()
        .take(3)
        .map(|o| format!("<li>{}</li>", esc(&o.topic)))
        .collect();
    let summary = format!(
        r#"<div style="margin:20px 0; padding:16px; background:#e7f1ff; border-radius:8px;">
<h3 style="margin:0 0 10px 0; font-size:1.15em;">📋 TL;DR</h3>
<p style="margin:4px 0;"><b>Type:</b> {} &nbsp;|&nbsp; <b>Goal:</b> {}</p>
<p style="margin:4px 0;"><b>Audience:</b> {}</p>
<p style="margin:4px 0;"><b>Duration:</b> {}</p>
<p style="margin:8px 0 0 0;"><b>Three talking points:</b></p>
<ul style="margin:4px 0; padding-left:20px;">{}</ul>
</div>"#,
        esc(&idea.video_type),
        esc(&idea.goal),
        esc(&idea.audience),
        TARGET_DURATION,
        points
    );

    let nav_links: String = [
        ("hook", "Hook"),
        ("outline", "Outline"),
        ("thumbnail", "Thumbnail"),
        ("script", "Script"),
        ("description", "Description"),
        ("tags", "Tags / CTA"),
    ]
    .iter()
    .map(|(id, text)| {
        format!(r##"<a href="#{id}" style="margin:0 8px; color:#0d6efd;">{text}</a>"##)
    })
    .collect::<Vec<_>>()
    .join("\n");
    let nav = format!(
        r#"<nav style="margin:16px 0; padding:12px; background:#f1f3f5; border-radius:8px; font-size:0.95em;">
<strong>Contents:</strong>
{nav_links}
</nav>"#
    );

    let hook = block(
        "⚡ Hook",
        "hook",
        &format!(
            r#"<p style="margin:0; white-space:pre-wrap;">{}</p>"#,
            esc(&idea.hook)
        ),
    );

    let segments: String = idea
        .outline
        .iter()
        .map(|o| format!("<li><b>{}</b> — {}</li>", esc(&o.t), esc(&o.topic)))
        .collect();
    let outline = block(
        "🧱 Outline",
        "outline",
        &format!(r#"<ul style="margin:0; padding-left:20px;">{segments}</ul>"#),
    );

    let thumb = &idea.thumbnail_chosen;
    let thumbnail = block(
        "🖼️ Thumbnail",
        "thumbnail",
        &format!(
            r#"<p style="margin:0;"><b>Visual:</b> {}<br/><b>Text:</b> {}<br/><b>Emotion:</b> {}</p>"#,
            esc(&thumb.visual),
            esc(&thumb.text),
            esc(&thumb.emotion)
        ),
    );

    let script = block(
        "📝 Script",
        "script",
        &collapsed("Show full script", &idea.full_script),
    );
    let description = block(
        "📄 Description",
        "description",
        &collapsed("Show description", &idea.description),
    );

    let tags = block(
        "🏷️ Tags and CTA",
        "tags",
        &format!(
            r#"<p style="margin:0;"><b>Tags:</b> {}</p><p style="margin:8px 0 0 0;"><b>CTA:</b> {}</p>"#,
            esc(&idea.tags.join(", ")),
            esc(&idea.cta)
        ),
    );

    let mut sections = vec![
        headline,
        summary,
        nav,
        hook,
        outline,
        thumbnail,
        script,
        description,
        tags,
    ];

    if let Some(url) = favorite.and_then(|f| f.url(&idea.chosen_title)) {
        sections.push(format!(
            r#"<p style="margin:24px 0; text-align:center;"><a href="{}" style="display:inline-block; padding:10px 18px; background:#ffc107; color:#212529; border-radius:6px; text-decoration:none; font-weight:600;">⭐ Favorite this idea</a></p>"#,
            encode_double_quoted_attribute(url.as_str())
        ));
    }

    format!(
        r#"<div style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.5; max-width: 640px; margin: 0 auto;">
{}
</div>"#,
        sections.join("\n")
    )
}
