//! # Daily Idea
//!
//! A scheduled video-idea generator. Once a day it asks a chat-completion
//! model for one complete video package, emails it, and records it in a
//! rolling history so the next days avoid the same topics. Favorites
//! starred from the email are collected into a weekly digest.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────┐   ┌────────┐
//! │  trends  │──▶│  prompt  │──▶│generate│──▶│ render │──▶ mail
//! └──────────┘   └────▲─────┘   └────────┘   └────────┘
//!                     │                           │
//! ┌──────────┐   ┌────┴─────┐                     ▼
//! │ history  │──▶│guard+label│            history.save
//! └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! daily-idea run                    # generate, email, record
//! daily-idea history --days 14      # what the next run would avoid
//! daily-idea favorite               # append ISSUE_* to the weekly log
//! daily-idea digest                 # mail and archive the week's favorites
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`error`] | Typed failures |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | History and idea data types |
//! | [`trends`] | Search-trend context |
//! | [`history`] | History store trait and adapters |
//! | [`guard`] | Trailing-window repetition guard |
//! | [`labels`] | Category selection |
//! | [`prompt`] | Prompt assembly |
//! | [`generate`] | Completion client, JSON extraction, retry |
//! | [`render`] | HTML email rendering |
//! | [`mail`] | Email delivery |
//! | [`debug`] | Run context and debug bundle |
//! | [`run`] | Daily pipeline |
//! | [`favorites`] | Favorite log and weekly digest |

pub mod config;
pub mod debug;
pub mod error;
pub mod favorites;
pub mod generate;
pub mod guard;
pub mod history;
pub mod labels;
pub mod logging;
pub mod mail;
pub mod models;
pub mod prompt;
pub mod render;
pub mod run;
pub mod trends;
