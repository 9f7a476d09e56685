use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Staff,
    Visitor,
}

/// Membership of a staff member or visitor in a bus channel. Soft-deleted;
/// at most one live row per (channel_id, member_id, member_type).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelMember {
    pub id: Uuid,
    pub channel_id: String,
    pub member_id: Uuid,
    pub member_type: MemberType,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
