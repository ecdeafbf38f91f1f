use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

use daily_idea::config::EmailCredentials;
use daily_idea::error::IdeaError;
use daily_idea::favorites::{
    append_favorite, archive_path, run_digest, weekly_path, DigestOutcome, DIGEST_SUBJECT,
};
use daily_idea::mail::{EmailMessage, Mailer};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), IdeaError> {
        if self.fail {
            return Err(IdeaError::Delivery("503: unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn email() -> EmailCredentials {
    EmailCredentials {
        email_key: "re_test".to_string(),
        email_to: "me@example.com".to_string(),
        email_from: "bot@example.com".to_string(),
    }
}

const HEADER: &str = "# Favorites\n\nThis week's picks.\n\n";

#[tokio::test]
async fn test_missing_log_is_noop() {
    let tmp = TempDir::new().unwrap();
    let mailer = RecordingMailer::default();
    let outcome = run_digest(tmp.path(), &mailer, &email(), Utc::now()).await.unwrap();
    assert_eq!(outcome, DigestOutcome::NoLog);
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_header_only_log_is_noop() {
    let tmp = TempDir::new().unwrap();
    fs::write(weekly_path(tmp.path()), HEADER).unwrap();
    fs::write(archive_path(tmp.path()), "## Week of 2026-10-12\n\nold\n\n").unwrap();

    let mailer = RecordingMailer::default();
    let outcome = run_digest(tmp.path(), &mailer, &email(), Utc::now()).await.unwrap();

    assert_eq!(outcome, DigestOutcome::Empty);
    assert!(mailer.sent.lock().unwrap().is_empty());
    assert_eq!(
        fs::read_to_string(archive_path(tmp.path())).unwrap(),
        "## Week of 2026-10-12\n\nold\n\n"
    );
    assert_eq!(fs::read_to_string(weekly_path(tmp.path())).unwrap(), HEADER);
}

#[tokio::test]
async fn test_append_then_digest() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("favorites");
    let saved_at = Utc.with_ymd_and_hms(2026, 10, 16, 18, 30, 0).unwrap();

    append_favorite(
        &dir,
        "Favorite: Grid <vs> Flex",
        "### Idea title\n\nGrid <vs> Flex\n\n### Short summary (optional)\n\nNice & short",
        "https://github.com/octo/ideas/issues/7",
        saved_at,
    )
    .unwrap();
    append_favorite(
        &dir,
        "Favorite: Remote contracts",
        "",
        "https://github.com/octo/ideas/issues/8",
        saved_at,
    )
    .unwrap();

    let header_before = {
        let raw = fs::read_to_string(weekly_path(&dir)).unwrap();
        raw.split('\n').take(4).collect::<Vec<_>>().join("\n")
    };

    let mailer = RecordingMailer::default();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
    let outcome = run_digest(&dir, &mailer, &email(), now).await.unwrap();
    assert_eq!(outcome, DigestOutcome::Sent { entries: 2 });

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, DIGEST_SUBJECT);
    assert!(sent[0].html.contains("Grid &lt;vs&gt; Flex"));
    assert!(sent[0].html.contains("Nice &amp; short"));

    let archive = fs::read_to_string(archive_path(&dir)).unwrap();
    assert!(archive.starts_with("## Week of 2026-10-19\n\n## ⭐ Grid <vs> Flex\n"));
    assert!(archive.contains("## ⭐ Remote contracts"));
    assert!(archive.ends_with("- Notes: -\n\n"));

    let weekly = fs::read_to_string(weekly_path(&dir)).unwrap();
    assert_eq!(weekly, format!("{}\n", header_before));
    assert!(!weekly.contains("## ⭐"));

    // A second digest in the same week has nothing left to send.
    let again = run_digest(&dir, &mailer, &email(), now).await.unwrap();
    assert_eq!(again, DigestOutcome::Empty);
}

#[tokio::test]
async fn test_delivery_failure_leaves_files_untouched() {
    let tmp = TempDir::new().unwrap();
    append_favorite(tmp.path(), "Favorite: A", "", "u", Utc::now()).unwrap();
    let weekly_before = fs::read_to_string(weekly_path(tmp.path())).unwrap();

    let mailer = RecordingMailer {
        fail: true,
        ..Default::default()
    };
    let err = run_digest(tmp.path(), &mailer, &email(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<IdeaError>(), Some(IdeaError::Delivery(_))));
    assert_eq!(fs::read_to_string(weekly_path(tmp.path())).unwrap(), weekly_before);
    assert!(!archive_path(tmp.path()).exists());
}
