//! AI orchestration client.
//!
//! The fallback scheduler hands a stalled visitor message to the AI
//! orchestration service and waits for the final answer — the call is
//! synchronous on purpose, because its outcome gates the visitor's retry
//! counter and sender flags.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AiConfig;

/// Everything the AI service needs to answer on a conversation: tenant and
/// team routing, the recovered message, and the correlation id the reply
/// will be published under.
#[derive(Debug, Clone, Serialize)]
pub struct AiFallbackRequest {
    pub project_id: Uuid,
    pub visitor_id: Uuid,
    pub message: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub client_msg_no: String,
    pub from_uid: String,
    pub session_id: String,
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_ids: Option<Vec<Uuid>>,
}

#[async_trait]
pub trait AiResponder: Send + Sync {
    /// Invoke the AI and await completion. `Ok(None)` means the service
    /// produced no reply.
    async fn handle_ai_response(
        &self,
        request: &AiFallbackRequest,
    ) -> Result<Option<String>, AiError>;
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI API error ({code}): {message}")]
    Api { code: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct AiFallbackResponse {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the AI orchestration service.
#[derive(Debug, Clone)]
pub struct HttpAiResponder {
    client: Client,
    base_url: String,
}

impl HttpAiResponder {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &AiConfig, base_url: String) -> Result<Self, AiError> {
        let mut responder = Self::new(config)?;
        responder.base_url = base_url.trim_end_matches('/').to_string();
        Ok(responder)
    }
}

#[async_trait]
impl AiResponder for HttpAiResponder {
    async fn handle_ai_response(
        &self,
        request: &AiFallbackRequest,
    ) -> Result<Option<String>, AiError> {
        let url = format!("{}/v1/responses", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "AI API error");
            return Err(AiError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: AiFallbackResponse = response.json().await?;
        Ok(body.content)
    }
}

// ============================================================================
// TESTS
// ============================================================================
