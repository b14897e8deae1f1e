use std::{env::var, fmt, str::FromStr};

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` refines the filter on top of `level`, and `RUST_LOG_FORMAT`
/// (`compact` or `json`) takes precedence over `format`.
pub fn init_with(level: LevelFilter, format: LogFormat) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let (format, rejected) = resolve_format(format, var("RUST_LOG_FORMAT").ok());

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();

    if let Some(error) = rejected {
        warn!("Ignoring RUST_LOG_FORMAT, falling back to {format}: {error}");
    }
}

/// Pick the effective format; the second value carries a parse error for an
/// override that could not be used.
fn resolve_format(configured: LogFormat, env_override: Option<String>) -> (LogFormat, Option<String>) {
    match env_override {
        None => (configured, None),
        Some(raw) => match raw.parse() {
            Ok(format) => (format, None),
            Err(error) => (configured, Some(error)),
        },
    }
}
