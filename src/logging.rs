//! Logging setup.
//!
//! Reads `DAILY_IDEA_LOG` for the filter (`info` when unset or invalid).
//! Output goes to stderr so stdout stays free for command output.

use std::str::FromStr;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DAILY_IDEA_LOG";

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}': expected text or json", other)),
        }
    }
}

/// Install the global subscriber. Idempotent.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false);

        match format {
            LogFormat::Text => builder.init(),
            LogFormat::Json => builder.json().init(),
        }
    });
}
