//! Configuration: a TOML file for behaviour, the environment for secrets.
//!
//! Every section of the file is optional; a missing default config file
//! yields [`Config::default`]. Secrets never live in the file, they are
//! read into [`Credentials`] right before a job starts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::IdeaError;

pub const ENV_COMPLETION_KEY: &str = "GROQ_API_KEY";
pub const ENV_EMAIL_KEY: &str = "RESEND_API_KEY";
pub const ENV_EMAIL_TO: &str = "EMAIL_TO";
pub const ENV_EMAIL_FROM: &str = "EMAIL_FROM";
pub const ENV_MODEL: &str = "GROQ_MODEL";
pub const ENV_TRACKER_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_TRACKER_REPO: &str = "GITHUB_REPOSITORY";

/// Longest accepted repetition window (ten years).
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Variables reported (by name only) in the run metadata.
const REPORTED_ENV_VARS: &[&str] = &[
    ENV_COMPLETION_KEY,
    ENV_EMAIL_KEY,
    ENV_EMAIL_TO,
    ENV_EMAIL_FROM,
    ENV_TRACKER_TOKEN,
    ENV_TRACKER_REPO,
];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub history: HistoryConfig,
    pub tracker: TrackerConfig,
    pub email: EmailConfig,
    pub paths: PathsConfig,
    pub labels: Vec<LabelSpec>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub retry_temperature: f32,
    pub language: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            temperature: 0.9,
            retry_temperature: 0.2,
            language: "Brazilian Portuguese".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// `"github"` or `"file"`.
    pub backend: String,
    pub issue_title: String,
    pub file: PathBuf,
    pub max_items: usize,
    pub window_days: i64,
    pub recent_for_prompt: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: "github".to_string(),
            issue_title: "daily-content-idea-history".to_string(),
            file: PathBuf::from("data/history.json"),
            max_items: 50,
            window_days: 14,
            recent_for_prompt: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    pub api_base: String,
    pub web_base: String,
    pub favorite_template: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            web_base: "https://github.com".to_string(),
            favorite_template: "favorite.yml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub api_base: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.resend.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub debug_dir: PathBuf,
    pub trends_file: PathBuf,
    pub favorites_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            debug_dir: PathBuf::from("debug"),
            trends_file: PathBuf::from("trends.json"),
            favorites_dir: PathBuf::from("favorites"),
        }
    }
}

/// One content category the selector can pick.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LabelSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl LabelSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            weight: default_weight(),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_labels() -> Vec<LabelSpec> {
    vec![
        LabelSpec::new(
            "career",
            "Building an international developer career from Brazil: job hunting abroad, \
             compensation, contracts, relocation versus remote.",
        ),
        LabelSpec::new(
            "tech",
            "Hands-on frontend engineering: React, TypeScript, web performance, design systems \
             and the trade-offs senior engineers actually make.",
        ),
        LabelSpec::new(
            "work",
            "Day-to-day work on distributed teams: communication, estimates, code review, \
             visibility and growing towards senior/staff.",
        ),
        LabelSpec::new(
            "life",
            "Life around the job: routine, burnout, money, time zones and the personal side of \
             working for foreign companies.",
        ),
        LabelSpec::new(
            "english",
            "English for developers: interviews, meetings, writing, accent anxiety and practical \
             ways to improve while working.",
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            history: HistoryConfig::default(),
            tracker: TrackerConfig::default(),
            email: EmailConfig::default(),
            paths: PathsConfig::default(),
            labels: default_labels(),
        }
    }
}

impl Config {
    /// Default config path, relative to the working directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from("./config/daily-idea.toml")
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Resolve the config for the CLI: an explicit path must exist, the
/// default path is optional.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let path = Config::default_path();
            if path.exists() {
                load_config(&path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Reject repetition windows outside `1..=MAX_WINDOW_DAYS`.
pub fn check_window_days(name: &str, days: i64) -> Result<()> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        bail!("{} must be between 1 and {} (got {})", name, MAX_WINDOW_DAYS, days);
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.history.max_items == 0 {
        bail!("history.max_items must be >= 1");
    }
    check_window_days("history.window_days", config.history.window_days)?;
    match config.history.backend.as_str() {
        "github" | "file" => {}
        other => bail!(
            "Unknown history backend: '{}'. Must be github or file.",
            other
        ),
    }

    for (name, t) in [
        ("generation.temperature", config.generation.temperature),
        ("generation.retry_temperature", config.generation.retry_temperature),
    ] {
        if !(0.0..=2.0).contains(&t) {
            bail!("{} must be in [0.0, 2.0]", name);
        }
    }

    let mut seen = HashSet::new();
    for label in &config.labels {
        if label.name.trim().is_empty() {
            bail!("labels[].name must not be empty");
        }
        if !seen.insert(label.name.as_str()) {
            bail!("duplicate label: '{}'", label.name);
        }
        if !label.weight.is_finite() || label.weight < 0.0 {
            bail!("label '{}' has an invalid weight", label.name);
        }
    }

    Ok(())
}

// ============ Credentials ============

/// Secrets and addresses read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub completion_key: String,
    pub email_key: String,
    pub email_to: String,
    pub email_from: String,
    pub model_override: Option<String>,
    pub tracker_token: Option<String>,
    pub tracker_repo: Option<String>,
    /// Names of the known variables that were set.
    pub present: Vec<String>,
}

/// Email-only credentials, enough for the weekly digest.
#[derive(Debug, Clone)]
pub struct EmailCredentials {
    pub email_key: String,
    pub email_to: String,
    pub email_from: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, IdeaError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from an arbitrary lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IdeaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let require =
            |name: &str| get(name).ok_or_else(|| IdeaError::Configuration(name.to_string()));

        let present = REPORTED_ENV_VARS
            .iter()
            .copied()
            .filter(|name| get(name).is_some())
            .map(|name| name.to_string())
            .collect();

        Ok(Self {
            completion_key: require(ENV_COMPLETION_KEY)?,
            email_key: require(ENV_EMAIL_KEY)?,
            email_to: require(ENV_EMAIL_TO)?,
            email_from: require(ENV_EMAIL_FROM)?,
            model_override: get(ENV_MODEL),
            tracker_token: get(ENV_TRACKER_TOKEN),
            tracker_repo: get(ENV_TRACKER_REPO),
            present,
        })
    }

    /// Only the optional tracker variables, for read-only history access.
    pub fn tracker_from_env() -> Self {
        let get = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            tracker_token: get(ENV_TRACKER_TOKEN),
            tracker_repo: get(ENV_TRACKER_REPO),
            present: present_env_vars(),
            ..Self::default()
        }
    }

    /// The model to use: the environment override wins over the config.
    pub fn model(&self, config: &GenerationConfig) -> String {
        self.model_override
            .clone()
            .unwrap_or_else(|| config.model.clone())
    }

    pub fn email(&self) -> EmailCredentials {
        EmailCredentials {
            email_key: self.email_key.clone(),
            email_to: self.email_to.clone(),
            email_from: self.email_from.clone(),
        }
    }
}

impl EmailCredentials {
    pub fn from_env() -> Result<Self, IdeaError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, IdeaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| IdeaError::Configuration(name.to_string()))
        };
        Ok(Self {
            email_key: require(ENV_EMAIL_KEY)?,
            email_to: require(ENV_EMAIL_TO)?,
            email_from: require(ENV_EMAIL_FROM)?,
        })
    }
}

/// The model a run will report before credentials are checked.
pub fn model_from_env(config: &GenerationConfig) -> String {
    std::env::var(ENV_MODEL)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config.model.clone())
}

/// Names of the known variables currently set, for failure reports.
pub fn present_env_vars() -> Vec<String> {
    REPORTED_ENV_VARS
        .iter()
        .filter(|name| std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false))
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ENV_COMPLETION_KEY, "gsk"),
            (ENV_EMAIL_KEY, "re"),
            (ENV_EMAIL_TO, "me@example.com"),
            (ENV_EMAIL_FROM, "bot@example.com"),
        ])
    }

    #[test]
    fn test_defaults_have_five_labels() {
        let config = Config::default();
        assert_eq!(config.labels.len(), 5);
        assert_eq!(config.history.max_items, 50);
        assert_eq!(config.history.window_days, 14);
        validate(&config).unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[history]
backend = "file"
window_days = 7
"#,
        )
        .unwrap();
        assert_eq!(config.history.backend, "file");
        assert_eq!(config.history.window_days, 7);
        assert_eq!(config.history.max_items, 50);
        assert_eq!(config.labels.len(), 5);
        assert_eq!(config.generation.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_custom_labels_replace_defaults() {
        let config: Config = toml::from_str(
            r#"
[[labels]]
name = "shorts"
weight = 2.0

[[labels]]
name = "live"
"#,
        )
        .unwrap();
        assert_eq!(config.labels.len(), 2);
        assert_eq!(config.labels[0].weight, 2.0);
        assert_eq!(config.labels[1].weight, 1.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.history.max_items = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.history.backend = "redis".to_string();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.labels.push(LabelSpec::new("tech", "again"));
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.generation.temperature = 3.5;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.history.window_days = 100_000_000;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("history.window_days"));

        let mut config = Config::default();
        config.history.window_days = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_credentials_require_email_and_completion_keys() {
        let vars = full_env();
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.email_to, "me@example.com");
        assert!(creds.tracker_token.is_none());
        assert_eq!(creds.present.len(), 4);

        let mut vars = full_env();
        vars.remove(ENV_EMAIL_FROM);
        let err = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, IdeaError::Configuration(ref name) if name == ENV_EMAIL_FROM));
    }

    #[test]
    fn test_empty_variable_counts_as_missing() {
        let mut vars = full_env();
        vars.insert(ENV_COMPLETION_KEY.to_string(), String::new());
        assert!(Credentials::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_model_override() {
        let mut vars = full_env();
        vars.insert(ENV_MODEL.to_string(), "mixtral".to_string());
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.model(&GenerationConfig::default()), "mixtral");
    }

    #[test]
    fn test_email_credentials_only_need_email_vars() {
        let vars = env(&[
            (ENV_EMAIL_KEY, "re"),
            (ENV_EMAIL_TO, "me@example.com"),
            (ENV_EMAIL_FROM, "bot@example.com"),
        ]);
        assert!(EmailCredentials::from_lookup(|k| vars.get(k).cloned()).is_ok());
    }
}
