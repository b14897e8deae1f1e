use thiserror::Error;
use url::Url;

use crate::database::models::{NewMonitor, NewWebhook};

pub const MAX_NAME_LEN: usize = 200;
pub const MIN_INTERVAL_SECONDS: u64 = 10;
pub const MAX_INTERVAL_SECONDS: u64 = 86400;
pub const MAX_WEBHOOK_URL_LEN: usize = 2048;

/// Rejected registry input, with a message fit for an operator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("name too long (max {MAX_NAME_LEN} characters)")]
    NameTooLong,

    #[error("interval must be between {MIN_INTERVAL_SECONDS} and {MAX_INTERVAL_SECONDS} seconds, got {0}")]
    IntervalOutOfRange(u64),

    #[error("target cannot be empty")]
    EmptyUrl,

    #[error("URL too long (max {MAX_WEBHOOK_URL_LEN} characters)")]
    UrlTooLong,

    #[error("URL must include scheme (http:// or https://)")]
    MissingScheme,

    #[error("invalid scheme '{0}', must be http or https")]
    UnsupportedScheme(String),

    #[error("URL must have a valid host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    Malformed(String),
}

/// Validate an HTTP/HTTPS URL with a host
pub fn validate_http_endpoint(target: &str) -> Result<(), ValidationError> {
    if target.trim().is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let url = Url::parse(target).map_err(|e| {
        if target.contains("://") {
            ValidationError::Malformed(e.to_string())
        } else {
            ValidationError::MissingScheme
        }
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::MissingHost);
    }

    Ok(())
}

/// Names are measured in characters after trimming
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong);
    }

    Ok(())
}

pub fn validate_interval(interval_seconds: u64) -> Result<(), ValidationError> {
    if !(MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&interval_seconds) {
        return Err(ValidationError::IntervalOutOfRange(interval_seconds));
    }
    Ok(())
}

impl NewMonitor {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_interval(self.interval_seconds)?;
        validate_http_endpoint(&self.url)
    }
}

impl NewWebhook {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if self.url.len() > MAX_WEBHOOK_URL_LEN {
            return Err(ValidationError::UrlTooLong);
        }
        validate_http_endpoint(&self.url)
    }
}
