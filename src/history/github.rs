//! GitHub issue [`HistoryStore`].
//!
//! The history document is the body of one issue with a fixed title in
//! the repository named by `GITHUB_REPOSITORY`. The issue is created on
//! first use.
//!
//! # Endpoints
//!
//! | Call | Purpose |
//! |------|---------|
//! | `GET /repos/{owner}/{repo}/issues?state=all&per_page=100` | find the history issue |
//! | `POST /repos/{owner}/{repo}/issues` | create it |
//! | `PATCH /repos/{owner}/{repo}/issues/{number}` | replace its body |
//!
//! Without a token or a valid `owner/name` repository the store is
//! disabled: `load` returns an empty document and `save` does nothing.
//! A save rejected by the API is logged and dropped; only transport
//! failures surface as errors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;

use super::HistoryStore;
use crate::config::{HistoryConfig, TrackerConfig};
use crate::error::{preview, IdeaError};
use crate::models::{HistoryDecodeError, HistoryDocument, HistoryItem};

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("daily-idea/", env!("CARGO_PKG_VERSION"));

/// `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let (owner, name) = raw.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// The subset of an issue listing entry we read.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
}

struct Target {
    repo: RepoRef,
    token: String,
}

pub struct GitHubHistoryStore {
    client: reqwest::Client,
    api_base: String,
    issue_title: String,
    max_items: usize,
    target: Option<Target>,
    disabled_reason: &'static str,
}

impl GitHubHistoryStore {
    pub fn new(
        tracker: &TrackerConfig,
        history: &HistoryConfig,
        token: Option<String>,
        repo: Option<&str>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let (target, disabled_reason) = match (token, repo) {
            (Some(token), Some(repo)) => match RepoRef::parse(repo) {
                Some(repo) => (Some(Target { repo, token }), ""),
                None => (None, "invalid GITHUB_REPOSITORY"),
            },
            _ => (None, "GITHUB_TOKEN or GITHUB_REPOSITORY missing"),
        };

        Ok(Self {
            client,
            api_base: tracker.api_base.trim_end_matches('/').to_string(),
            issue_title: history.issue_title.clone(),
            max_items: history.max_items,
            target,
            disabled_reason,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    fn repo_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.name)
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn list_issues(&self, target: &Target) -> Result<Vec<IssueSummary>, IdeaError> {
        let url = format!("{}/issues?state=all&per_page=100", self.repo_url(&target.repo));
        let response = self
            .request(Method::GET, &url, &target.token)
            .send()
            .await
            .map_err(|e| IdeaError::HistoryUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdeaError::HistoryUnavailable(format!(
                "issue listing returned {}",
                status
            )));
        }
        response
            .json()
            .await
            .map_err(|e| IdeaError::HistoryUnavailable(e.to_string()))
    }

    async fn create_issue(&self, target: &Target, body: &str) -> Result<u64, IdeaError> {
        let url = format!("{}/issues", self.repo_url(&target.repo));
        let payload = serde_json::json!({ "title": self.issue_title, "body": body });
        let response = self
            .request(Method::POST, &url, &target.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| IdeaError::HistoryUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdeaError::HistoryUnavailable(format!(
                "issue creation returned {}",
                status
            )));
        }
        let created: CreatedIssue = response
            .json()
            .await
            .map_err(|e| IdeaError::HistoryUnavailable(e.to_string()))?;
        Ok(created.number)
    }

    async fn try_load(&self, target: &Target) -> Result<HistoryDocument, IdeaError> {
        let issues = self.list_issues(target).await?;

        let Some(issue) = find_history_issue(&issues, &self.issue_title) else {
            let number = self
                .create_issue(target, &HistoryDocument::default().to_json())
                .await?;
            tracing::info!(issue_number = number, "history_created");
            return Ok(HistoryDocument::empty_with_issue(Some(number)));
        };

        Ok(decode_issue_body(issue))
    }
}

/// The history issue: exact title match, pull requests excluded.
pub fn find_history_issue<'a>(
    issues: &'a [IssueSummary],
    title: &str,
) -> Option<&'a IssueSummary> {
    issues
        .iter()
        .find(|i| i.title == title && i.pull_request.is_none())
}

/// Decode the issue body; a broken body restarts the history on the same issue.
pub fn decode_issue_body(issue: &IssueSummary) -> HistoryDocument {
    let body = issue.body.as_deref().unwrap_or("{}");
    match HistoryDocument::parse(body) {
        Ok(mut doc) => {
            doc.issue_number = Some(issue.number);
            doc
        }
        Err(HistoryDecodeError::InvalidJson) => {
            tracing::warn!(
                issue_number = issue.number,
                action = "reinit",
                "history_invalid_json"
            );
            HistoryDocument::empty_with_issue(Some(issue.number))
        }
        Err(HistoryDecodeError::MissingItems) => {
            tracing::warn!(
                issue_number = issue.number,
                action = "reinit",
                "history_invalid_structure"
            );
            HistoryDocument::empty_with_issue(Some(issue.number))
        }
    }
}

#[async_trait]
impl HistoryStore for GitHubHistoryStore {
    fn backend(&self) -> &str {
        "github"
    }

    async fn load(&self) -> HistoryDocument {
        let Some(target) = &self.target else {
            tracing::info!(reason = self.disabled_reason, "history_skip");
            return HistoryDocument::default();
        };

        match self.try_load(target).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "history_load_failed");
                HistoryDocument::default()
            }
        }
    }

    async fn save(&self, item: HistoryItem, existing: &HistoryDocument) -> Result<()> {
        let Some(target) = &self.target else {
            return Ok(());
        };

        let body = existing.with_item(item, self.max_items).to_json();

        let response = match existing.issue_number {
            None => {
                let url = format!("{}/issues", self.repo_url(&target.repo));
                self.request(Method::POST, &url, &target.token)
                    .json(&serde_json::json!({ "title": self.issue_title, "body": body }))
                    .send()
                    .await
            }
            Some(number) => {
                let url = format!("{}/issues/{}", self.repo_url(&target.repo), number);
                self.request(Method::PATCH, &url, &target.token)
                    .json(&serde_json::json!({ "body": body }))
                    .send()
                    .await
            }
        }
        .context("Failed to reach GitHub while saving history")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(
                repo = %target.repo.full_name(),
                issue_number = ?existing.issue_number,
                status = status.as_u16(),
                body = %preview(&text, 200),
                "history_save_failed"
            );
            return Ok(());
        }

        tracing::info!(
            repo = %target.repo.full_name(),
            issue_number = ?existing.issue_number,
            "history_saved"
        );
        Ok(())
    }
}
