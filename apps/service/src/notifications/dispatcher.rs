use anyhow::Result;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::message::WebhookPayload;
use crate::config::NotifierConfig;
use crate::database::Database;
use crate::database::models::{CheckRecord, Monitor, Webhook};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("webhook answered with status {0}")]
    Rejected(u16),

    #[error("dispatcher is shut down")]
    Closed,
}

/// Outcome of one notification across all enabled webhooks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Fans transition messages out to every enabled webhook.
///
/// Deliveries are independent: a slow or failing webhook never holds up
/// the others, and nothing here ever feeds back into the check pipeline.
#[derive(Clone)]
pub struct Notifier {
    database: Arc<dyn Database>,
    client: Client,
    permits: Arc<Semaphore>,
    footer: Arc<str>,
}

impl Notifier {
    pub fn new(database: Arc<dyn Database>, config: &NotifierConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).connect_timeout(config.timeout()).build()?;

        Ok(Self {
            database,
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_deliveries.max(1))),
            footer: Arc::from(config.footer.as_str()),
        })
    }

    /// Run `notify` in the background
    pub fn spawn_notify(&self, monitor: Monitor, check: CheckRecord) -> JoinHandle<DispatchReport> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.notify(&monitor, &check).await })
    }

    /// Send the transition message to every enabled webhook concurrently
    pub async fn notify(&self, monitor: &Monitor, check: &CheckRecord) -> DispatchReport {
        let webhooks = match self.database.list_enabled_webhooks().await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                error!(monitor_id = monitor.id, "Failed to load webhooks: {}", e);
                return DispatchReport::default();
            }
        };

        if webhooks.is_empty() {
            debug!(monitor_id = monitor.id, "No enabled webhooks, skipping notification");
            return DispatchReport::default();
        }

        let payload = WebhookPayload::transition(monitor, check, &self.footer);
        let outcomes = join_all(webhooks.iter().map(|webhook| self.deliver(webhook, &payload))).await;

        let mut report = DispatchReport { attempted: webhooks.len(), ..Default::default() };
        for (webhook, outcome) in webhooks.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(monitor_id = monitor.id, webhook_id = webhook.id, "Webhook delivery failed: {}", e);
                }
            }
        }

        debug!(
            monitor_id = monitor.id,
            delivered = report.delivered,
            failed = report.failed,
            "Notification dispatched"
        );
        report
    }

    async fn deliver(&self, webhook: &Webhook, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let _permit = self.permits.acquire().await.map_err(|_| DeliveryError::Closed)?;

        let response = self.client.post(&webhook.url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
