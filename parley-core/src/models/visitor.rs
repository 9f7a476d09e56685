use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retry budget for automatic AI fallback. Once a visitor reaches it, the
/// scheduler leaves them alone until a success (or a new message) resets
/// the counter.
pub const MAX_AI_FALLBACK_RETRIES: i32 = 3;

/// Service lifecycle of a visitor: new → queued → active → closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    New,
    Queued,
    Active,
    Closed,
}

/// One end user per platform. Never deleted, only soft-marked.
///
/// `is_last_message_from_visitor` and `is_last_message_from_ai` are never
/// both true; `last_client_msg_no` is the correlation id used to re-fetch
/// the most recent message from the bus.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Visitor {
    pub id: Uuid,
    pub project_id: Uuid,
    pub platform_id: Uuid,
    pub service_status: ServiceStatus,
    pub is_last_message_from_visitor: bool,
    pub is_last_message_from_ai: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_seq: i64,
    pub last_client_msg_no: Option<String>,
    pub ai_fallback_retry_count: i32,
    pub ai_disabled: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
