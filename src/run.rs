//! The daily pipeline.
//!
//! ```text
//! trends ─┐
//!         ├─▶ guard ─▶ label ─▶ prompt ─▶ generate ─▶ render ─▶ send ─▶ save history
//! history ┘
//! ```
//!
//! Every step is awaited in order. [`run_daily`] is the pure pipeline over
//! injected [`Services`]; [`execute`] adds the fatal-path handling (one
//! `fatal` event plus the debug bundle) and [`run_from_env`] wires the
//! production clients from configuration and environment.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::config::{model_from_env, present_env_vars, Config, Credentials, EmailCredentials};
use crate::debug::{write_bundle, RunContext, RunOutcome};
use crate::generate::{CompletionClient, IdeaGenerator, OpenAiCompatibleClient, RetryPolicy};
use crate::guard::compute_window;
use crate::history::{create_history_store, HistoryStore, RepoRef};
use crate::labels::{available_labels, select_label};
use crate::mail::{EmailMessage, Mailer, ResendMailer};
use crate::models::{HistoryItem, IdeaDocument, RecentEntry, RepetitionWindow};
use crate::prompt::{build_prompt, PromptInput};
use crate::render::{email_subject, render, FavoriteLink};
use crate::trends::{load_trends, render_trends};

/// External collaborators of a run.
pub struct Services<'a> {
    pub history: &'a dyn HistoryStore,
    pub completion: &'a dyn CompletionClient,
    pub mailer: &'a dyn Mailer,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct DailyOutcome {
    pub label: String,
    pub payload: Map<String, Value>,
    pub idea: IdeaDocument,
    pub subject: String,
    /// Items in the history document after the save.
    pub history_len: usize,
}

/// Run the pipeline once. `ctx` collects timings and diagnostics.
#[allow(clippy::too_many_arguments)]
pub async fn run_daily<R: Rng + ?Sized>(
    config: &Config,
    email: &EmailCredentials,
    repo: Option<&str>,
    services: &Services<'_>,
    ctx: &mut RunContext,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<DailyOutcome> {
    let trends = load_trends(&config.paths.trends_file).and_then(|snapshot| {
        let text = render_trends(&snapshot)?;
        ctx.trends_preview = Some(snapshot.preview(&text));
        Some(text)
    });

    let history = services.history.load().await;
    let window = compute_window(&history.items, config.history.window_days, now);

    let pool = available_labels(&config.labels, &window.labels).len();
    let label = select_label(&config.labels, &window.labels, rng);
    tracing::info!(
        label = %label.name,
        available = pool,
        history_items = history.items.len(),
        "label_selected"
    );
    ctx.label = Some(label.name.clone());

    let recent: Vec<RecentEntry> = history
        .items
        .iter()
        .take(config.history.recent_for_prompt)
        .map(RecentEntry::from)
        .collect();
    let prompt = build_prompt(&PromptInput {
        label: &label,
        recent: &recent,
        window: &window,
        trends: trends.as_deref(),
        language: &config.generation.language,
    });

    let generator = IdeaGenerator::new(
        services.completion,
        RetryPolicy::from_config(&config.generation),
    );
    let generation = match generator.generate(&prompt).await {
        Ok(generation) => generation,
        Err(failure) => {
            ctx.llm_time += failure.elapsed;
            ctx.raw_response = failure.last_raw;
            return Err(failure.error);
        }
    };
    ctx.llm_time += generation.elapsed;
    ctx.raw_response = Some(generation.raw.clone());

    let favorite = repo.and_then(RepoRef::parse).map(|repo| FavoriteLink {
        web_base: config.tracker.web_base.clone(),
        repo: repo.full_name(),
        template: config.tracker.favorite_template.clone(),
    });
    let subject = email_subject(&generation.idea);
    let message = EmailMessage {
        from: email.email_from.clone(),
        to: email.email_to.clone(),
        subject: subject.clone(),
        html: render(&generation.idea, favorite.as_ref()),
    };

    let sent_at = std::time::Instant::now();
    services.mailer.send(&message).await?;
    ctx.mail_time += sent_at.elapsed();
    tracing::info!(mail_ms = ctx.mail_time.as_millis() as u64, "email_sent");

    let item = HistoryItem::from_idea(&generation.idea, now);
    services.history.save(item, &history).await?;
    let history_len = (history.items.len() + 1).min(config.history.max_items);

    Ok(DailyOutcome {
        label: label.name,
        payload: generation.payload,
        idea: generation.idea,
        subject,
        history_len,
    })
}

/// [`run_daily`] plus outcome reporting: the `done` or `fatal` event and
/// the debug bundle.
#[allow(clippy::too_many_arguments)]
pub async fn execute<R: Rng + ?Sized>(
    config: &Config,
    email: &EmailCredentials,
    repo: Option<&str>,
    services: &Services<'_>,
    ctx: &mut RunContext,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<DailyOutcome> {
    match run_daily(config, email, repo, services, ctx, rng, now).await {
        Ok(outcome) => {
            tracing::info!(
                total_ms = ctx.total_ms() as u64,
                llm_ms = ctx.llm_time.as_millis() as u64,
                mail_ms = ctx.mail_time.as_millis() as u64,
                "done"
            );
            let report = RunOutcome::Succeeded {
                payload: &outcome.payload,
                idea: &outcome.idea,
            };
            if let Err(e) = write_bundle(&config.paths.debug_dir, ctx, &report) {
                tracing::warn!(error = %e, "debug_bundle_failed");
            }
            Ok(outcome)
        }
        Err(e) => Err(report_fatal(config, ctx, e)),
    }
}

/// Log the single `fatal` event and write the failure bundle.
pub fn report_fatal(config: &Config, ctx: &RunContext, error: anyhow::Error) -> anyhow::Error {
    let message = format!("{:#}", error);
    tracing::error!(error = %message, "fatal");
    let report = RunOutcome::Failed { message: &message };
    if let Err(e) = write_bundle(&config.paths.debug_dir, ctx, &report) {
        tracing::warn!(error = %e, "debug_bundle_failed");
    }
    error
}

fn wire(
    config: &Config,
    credentials: &Credentials,
) -> Result<(Box<dyn HistoryStore>, OpenAiCompatibleClient, ResendMailer)> {
    let history = create_history_store(config, credentials)?;
    let completion = OpenAiCompatibleClient::new(
        &config.generation,
        &credentials.completion_key,
        &credentials.model(&config.generation),
    )?;
    let mailer = ResendMailer::new(&config.email, &credentials.email());
    Ok((history, completion, mailer))
}

/// Production entry point for `daily-idea run`.
pub async fn run_from_env(config: &Config) -> Result<DailyOutcome> {
    let mut ctx = RunContext::new(&model_from_env(&config.generation), present_env_vars());
    let span = tracing::info_span!("run", run_id = %ctx.run_id);

    async move {
        tracing::info!(model = %ctx.model, env_vars = ?ctx.env_present, "start");

        let credentials = match Credentials::from_env() {
            Ok(c) => c,
            Err(e) => return Err(report_fatal(config, &ctx, e.into())),
        };

        let (history, completion, mailer) = match wire(config, &credentials) {
            Ok(parts) => parts,
            Err(e) => return Err(report_fatal(config, &ctx, e)),
        };

        let services = Services {
            history: history.as_ref(),
            completion: &completion,
            mailer: &mailer,
        };
        let mut rng = StdRng::from_entropy();
        execute(
            config,
            &credentials.email(),
            credentials.tracker_repo.as_deref(),
            &services,
            &mut ctx,
            &mut rng,
            Utc::now(),
        )
        .await
    }
    .instrument(span)
    .await
}

/// Read-only view of what the next run would see.
#[derive(Debug, Clone)]
pub struct HistoryReport {
    pub backend: String,
    pub total_items: usize,
    pub window: RepetitionWindow,
    pub pool: Vec<String>,
}

pub async fn history_report(
    config: &Config,
    store: &dyn HistoryStore,
    window_days: i64,
    now: DateTime<Utc>,
) -> HistoryReport {
    let doc = store.load().await;
    let window = compute_window(&doc.items, window_days, now);
    let available = available_labels(&config.labels, &window.labels);
    let pool = if available.is_empty() {
        config.labels.iter().map(|l| l.name.clone()).collect()
    } else {
        available.into_iter().map(|l| l.name.clone()).collect()
    };
    HistoryReport {
        backend: store.backend().to_string(),
        total_items: doc.items.len(),
        window,
        pool,
    }
}
