//! Queue-trigger collaborator.
//!
//! When a close frees a staffed slot, the queue service is poked so it can
//! reassign waiting visitors. Fire-and-forget at the call site: the close
//! protocol logs a failure and moves on.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::QueueConfig;

#[async_trait]
pub trait QueueTrigger: Send + Sync {
    /// Signal that `staff_id` has a free slot on `project_id`.
    async fn trigger_queue_for_staff(
        &self,
        staff_id: Uuid,
        project_id: Uuid,
    ) -> Result<(), QueueError>;
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Queue API error ({code}): {message}")]
    Api { code: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct HttpQueueTrigger {
    client: Client,
    base_url: String,
}

impl HttpQueueTrigger {
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &QueueConfig, base_url: String) -> Result<Self, QueueError> {
        let mut trigger = Self::new(config)?;
        trigger.base_url = base_url.trim_end_matches('/').to_string();
        Ok(trigger)
    }
}

#[async_trait]
impl QueueTrigger for HttpQueueTrigger {
    async fn trigger_queue_for_staff(
        &self,
        staff_id: Uuid,
        project_id: Uuid,
    ) -> Result<(), QueueError> {
        let url = format!("{}/v1/queue/trigger", self.base_url);
        let body = json!({
            "staff_id": staff_id,
            "project_id": project_id,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QueueError::Api {
                code: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
