use serde::{Deserialize, Serialize};

/// Lowest status code that counts as up
pub const UP_STATUS_MIN: u16 = 200;
/// First status code that no longer counts as up (redirects are up)
pub const UP_STATUS_MAX_EXCLUSIVE: u16 = 400;

/// Whether an HTTP status classifies the target as up
pub fn is_up_status(status_code: u16) -> bool {
    (UP_STATUS_MIN..UP_STATUS_MAX_EXCLUSIVE).contains(&status_code)
}

/// Outcome of one check. Never persisted as-is; the store derives a
/// check record and an aggregate increment from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// HTTP status code, 0 if no response was received
    pub status_code: u16,

    /// Wall-clock time of the attempt that produced this result
    pub latency_ms: u64,

    pub is_up: bool,
}

impl CheckResult {
    /// Classify a received HTTP status
    pub fn from_status(status_code: u16, latency_ms: u64) -> Self {
        Self { status_code, latency_ms, is_up: is_up_status(status_code) }
    }

    /// A check that never produced an HTTP response
    pub fn failed(latency_ms: u64) -> Self {
        Self { status_code: 0, latency_ms, is_up: false }
    }
}
