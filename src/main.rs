//! # Daily Idea CLI (`daily-idea`)
//!
//! ## Usage
//!
//! ```bash
//! daily-idea --config ./config/daily-idea.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `daily-idea run` | Generate, email and record today's idea |
//! | `daily-idea favorite` | Append one favorite to the weekly log |
//! | `daily-idea digest` | Email the week's favorites and archive them |
//! | `daily-idea history` | Show what the next run would avoid |
//!
//! Secrets come from the environment (`GROQ_API_KEY`, `RESEND_API_KEY`,
//! `EMAIL_TO`, `EMAIL_FROM`, optionally `GITHUB_TOKEN` and
//! `GITHUB_REPOSITORY`). Any error exits with status 1.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use daily_idea::config::{self, Credentials, EmailCredentials};
use daily_idea::favorites::{self, DigestOutcome};
use daily_idea::history::create_history_store;
use daily_idea::logging::{init_logging, LogFormat};
use daily_idea::mail::ResendMailer;
use daily_idea::run;

/// Daily video-idea generator.
///
/// Behaviour is read from an optional TOML file; see
/// `config/daily-idea.example.toml` for every setting.
#[derive(Parser)]
#[command(name = "daily-idea", version, about = "Daily video-idea generator")]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/daily-idea.toml`; built-in defaults are used
    /// when that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format: `text` or `json`.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily pipeline once.
    ///
    /// Loads history and trends, picks a category, generates an idea,
    /// emails it and appends it to the history.
    Run,

    /// Append a favorite to the weekly log.
    Favorite {
        /// Issue title.
        #[arg(long, env = "ISSUE_TITLE", default_value = "")]
        title: String,

        /// Issue body (the filled-in form).
        #[arg(long, env = "ISSUE_BODY", default_value = "")]
        body: String,

        /// Issue URL.
        #[arg(long, env = "ISSUE_URL", default_value = "")]
        url: String,
    },

    /// Email the week's favorites, archive them and clear the weekly log.
    Digest,

    /// Show the history window and the label pool for the next run.
    History {
        /// Window length in days (defaults to `history.window_days`).
        #[arg(long)]
        days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => {
            let outcome = run::run_from_env(&cfg).await?;
            println!("Email sent: {}", outcome.subject);
        }
        Commands::Favorite { title, body, url } => {
            let entry = favorites::append_favorite(
                &cfg.paths.favorites_dir,
                &title,
                &body,
                &url,
                Utc::now(),
            )?;
            println!("Appended favorite: {}", entry.title);
        }
        Commands::Digest => {
            let email = EmailCredentials::from_env()?;
            let mailer = ResendMailer::new(&cfg.email, &email);
            let outcome =
                favorites::run_digest(&cfg.paths.favorites_dir, &mailer, &email, Utc::now())
                    .await?;
            match outcome {
                DigestOutcome::NoLog => println!("No weekly file, skipping."),
                DigestOutcome::Empty => println!("No favorites this week, skipping."),
                DigestOutcome::Sent { entries } => {
                    println!("Weekly report sent ({} favorites), archive updated.", entries)
                }
            }
        }
        Commands::History { days } => {
            let days = days.unwrap_or(cfg.history.window_days);
            config::check_window_days("--days", days)?;
            let credentials = Credentials::tracker_from_env();
            let store = create_history_store(&cfg, &credentials)?;
            let report = run::history_report(&cfg, store.as_ref(), days, Utc::now()).await;

            println!("Backend:      {}", report.backend);
            println!("Items:        {}", report.total_items);
            println!("Window:       last {} days", days);
            println!("Titles:");
            for title in &report.window.titles {
                println!("  - {}", title);
            }
            println!(
                "Labels used:  {}",
                report.window.labels.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            println!(
                "Tags used:    {}",
                report.window.tags.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            println!("Next pool:    {}", report.pool.join(", "));
        }
    }

    Ok(())
}
