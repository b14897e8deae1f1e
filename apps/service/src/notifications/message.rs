use chrono::SecondsFormat;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::database::models::{CheckRecord, Monitor};

pub const COLOR_DOWN: u32 = 0xE74C3C;
pub const COLOR_RECOVERED: u32 = 0x2ECC71;

/// Discord-compatible webhook body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl EmbedField {
    fn new(name: &str, value: String, inline: bool) -> Self {
        Self { name: name.to_string(), value, inline }
    }
}

impl WebhookPayload {
    /// Message announcing that `monitor` changed state with `check`
    pub fn transition(monitor: &Monitor, check: &CheckRecord, footer: &str) -> Self {
        let (title, description, color) = if check.is_up {
            (
                format!("✅ Monitor Recovered: {}", monitor.name),
                format!("**{}** is back online and responding normally.", monitor.name),
                COLOR_RECOVERED,
            )
        } else {
            (
                format!("🔴 Monitor Down: {}", monitor.name),
                format!("**{}** is not responding. Immediate attention may be required.", monitor.name),
                COLOR_DOWN,
            )
        };

        let footer = (!footer.is_empty()).then(|| EmbedFooter { text: footer.to_string() });

        Self {
            embeds: vec![Embed {
                title,
                description,
                color,
                fields: vec![
                    EmbedField::new("URL", monitor.url.clone(), false),
                    EmbedField::new("Status Code", status_text(check.status_code), true),
                    EmbedField::new("Latency", format!("{}ms", check.latency_ms), true),
                    EmbedField::new("Interval", humanize_interval(monitor.interval_seconds), true),
                ],
                footer,
                timestamp: check.checked_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            }],
        }
    }
}

/// `"<code> <reason>"`, just the code for unknown statuses
pub fn status_text(status_code: u16) -> String {
    if status_code == 0 {
        return "N/A - Connection failed".to_string();
    }

    match StatusCode::from_u16(status_code).ok().and_then(|s| s.canonical_reason()) {
        Some(reason) => format!("{status_code} {reason}"),
        None => status_code.to_string(),
    }
}

pub fn humanize_interval(interval_seconds: u64) -> String {
    if interval_seconds % 60 == 0 {
        format!("Every {}m", interval_seconds / 60)
    } else {
        format!("Every {interval_seconds}s")
    }
}
