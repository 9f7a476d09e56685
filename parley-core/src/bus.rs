//! Messaging-bus client.
//!
//! Provides a `MessageBus` trait covering the five bus operations the
//! session lifecycle depends on, with an HTTP implementation. Every call
//! can fail; callers treat failures as best-effort skips (close protocol)
//! or retry-count increments (fallback scheduler).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::BusConfig;

/// Bus message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MessageType {
    Text = 1,
    Image = 2,
    File = 3,
    Voice = 4,
    Video = 5,
    // 1000-2000 reserved for system notifications
    StaffAssigned = 1000,
    SessionClosed = 1001,
    SessionTransferred = 1002,
    MemoryCleared = 1003,
}

/// Sequence/timestamp pair of the most recent message in a channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelLastMessage {
    pub message_seq: i64,
    /// Seconds-precision epoch timestamp.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "type", default)]
    pub message_type: i32,
    #[serde(default)]
    pub content: Option<String>,
}

/// A message re-fetched by its caller-supplied correlation id.
#[derive(Debug, Clone, Deserialize)]
pub struct BusMessage {
    #[serde(default)]
    pub message_seq: i64,
    pub client_msg_no: String,
    #[serde(default)]
    pub payload: MessagePayload,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Most recent message of a channel, if any.
    async fn channel_last_message(
        &self,
        channel_id: &str,
        channel_type: u8,
    ) -> Result<Option<ChannelLastMessage>, BusError>;

    /// Look a message up by its client message number.
    async fn message_by_client_msg_no(
        &self,
        channel_id: &str,
        channel_type: u8,
        client_msg_no: &str,
    ) -> Result<Option<BusMessage>, BusError>;

    /// Remove subscribers from a channel.
    async fn remove_channel_subscribers(
        &self,
        channel_id: &str,
        channel_type: u8,
        subscribers: &[String],
    ) -> Result<(), BusError>;

    /// Post the session-closed system message to a channel.
    async fn send_session_closed_message(
        &self,
        from_uid: &str,
        channel_id: &str,
        channel_type: u8,
        staff_uid: Option<&str>,
        staff_name: Option<&str>,
    ) -> Result<(), BusError>;

    /// Delete one member's private conversation view of a channel.
    async fn delete_conversation(
        &self,
        uid: &str,
        channel_id: &str,
        channel_type: u8,
    ) -> Result<(), BusError>;
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bus API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// HttpMessageBus
// ============================================================================

/// Bus client over the REST management API. Read lookups retry with
/// exponential backoff; mutations are single-shot.
#[derive(Debug, Clone)]
pub struct HttpMessageBus {
    client: Client,
    base_url: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl HttpMessageBus {
    pub fn new(config: &BusConfig) -> Result<Self, BusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &BusConfig, base_url: String) -> Result<Self, BusError> {
        let mut bus = Self::new(config)?;
        bus.base_url = base_url.trim_end_matches('/').to_string();
        Ok(bus)
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<(), BusError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BusError::Api {
                code: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn fetch_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, BusError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BusError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl MessageBus for HttpMessageBus {
    async fn channel_last_message(
        &self,
        channel_id: &str,
        channel_type: u8,
    ) -> Result<Option<ChannelLastMessage>, BusError> {
        let body = json!({
            "channel_id": channel_id,
            "channel_type": channel_type,
        });

        let result = Retry::spawn(self.retry_strategy(), || {
            self.fetch_optional::<ChannelLastMessage>("/channel/last_message", &body)
        })
        .await;

        result.map_err(|e| {
            tracing::warn!(channel_id, error = %e, "channel last-message lookup failed");
            BusError::RetryExhausted {
                attempts: self.max_retries,
            }
        })
    }

    async fn message_by_client_msg_no(
        &self,
        channel_id: &str,
        channel_type: u8,
        client_msg_no: &str,
    ) -> Result<Option<BusMessage>, BusError> {
        let body = json!({
            "channel_id": channel_id,
            "channel_type": channel_type,
            "client_msg_no": client_msg_no,
        });

        let result = Retry::spawn(self.retry_strategy(), || {
            self.fetch_optional::<BusMessage>("/message/search", &body)
        })
        .await;

        result.map_err(|e| {
            tracing::warn!(channel_id, client_msg_no, error = %e, "message lookup failed");
            BusError::RetryExhausted {
                attempts: self.max_retries,
            }
        })
    }

    async fn remove_channel_subscribers(
        &self,
        channel_id: &str,
        channel_type: u8,
        subscribers: &[String],
    ) -> Result<(), BusError> {
        let body = json!({
            "channel_id": channel_id,
            "channel_type": channel_type,
            "subscribers": subscribers,
        });
        self.post_json("/channel/subscriber_remove", &body).await
    }

    async fn send_session_closed_message(
        &self,
        from_uid: &str,
        channel_id: &str,
        channel_type: u8,
        staff_uid: Option<&str>,
        staff_name: Option<&str>,
    ) -> Result<(), BusError> {
        let mut payload = json!({
            "type": MessageType::SessionClosed as i32,
            "content": "The session has been closed",
        });
        if let Some(uid) = staff_uid {
            payload["staff_uid"] = json!(uid);
        }
        if let Some(name) = staff_name {
            payload["staff_name"] = json!(name);
        }

        let body = json!({
            "from_uid": from_uid,
            "channel_id": channel_id,
            "channel_type": channel_type,
            "payload": payload,
        });
        self.post_json("/message/send", &body).await
    }

    async fn delete_conversation(
        &self,
        uid: &str,
        channel_id: &str,
        channel_type: u8,
    ) -> Result<(), BusError> {
        let body = json!({
            "uid": uid,
            "channel_id": channel_id,
            "channel_type": channel_type,
        });
        self.post_json("/conversation/delete", &body).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
