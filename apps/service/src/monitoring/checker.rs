use anyhow::Result;
use reqwest::{Client, Method, redirect};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::CheckResult;
use super::validation::{GuardedResolver, TargetGuard};

/// Checker trait for probing a monitor's target
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Check the target. Every failure mode is folded into the result, so
    /// this never errors.
    async fn check(&self, target: &str) -> CheckResult;
}

/// HTTP/HTTPS checker: HEAD first, one GET if HEAD fails at the transport level
pub struct HttpChecker {
    client: Client,
    guard: TargetGuard,
}

impl HttpChecker {
    pub fn new(timeout: Duration, guard: TargetGuard) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(redirect::Policy::none())
            .no_proxy()
            .dns_resolver(Arc::new(GuardedResolver::new(guard)))
            .build()?;

        Ok(Self { client, guard })
    }

    /// One timed attempt. `Err` means no HTTP response was received.
    async fn attempt(&self, method: Method, target: &str) -> (Result<u16, reqwest::Error>, u64) {
        let start = Instant::now();
        let outcome = self.client.request(method, target).send().await.map(|resp| resp.status().as_u16());
        (outcome, start.elapsed().as_millis() as u64)
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str) -> CheckResult {
        if let Err(e) = self.guard.check_target(target) {
            debug!(target, "Check refused: {}", e);
            return CheckResult::failed(0);
        }

        let (head, head_latency) = self.attempt(Method::HEAD, target).await;
        let head_error = match head {
            Ok(status) => return CheckResult::from_status(status, head_latency),
            Err(e) => e,
        };

        debug!(target, "HEAD failed, retrying with GET: {}", head_error);

        // Latency restarts with the fallback attempt
        let (get, get_latency) = self.attempt(Method::GET, target).await;
        match get {
            Ok(status) => CheckResult::from_status(status, get_latency),
            Err(e) => {
                debug!(target, "GET failed: {}", e);
                CheckResult::failed(get_latency)
            }
        }
    }
}
