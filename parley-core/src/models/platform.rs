use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a tenant channel routes conversations: `auto` (AI handles all),
/// `assist` (human first, AI fallback on timeout), `off` (AI disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    Auto,
    Assist,
    Off,
}

/// Tenant-configurable channel source.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Platform {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub ai_mode: AiMode,
    /// Seconds before the AI takes over a stalled assist-mode conversation.
    /// 0 disables automatic fallback.
    pub fallback_to_ai_timeout: i32,
    pub agent_ids: Option<Vec<Uuid>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
