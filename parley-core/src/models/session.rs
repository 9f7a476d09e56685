use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// One human-staffed engagement window. At most one `open` session exists
/// per visitor; sessions are closed, never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VisitorSession {
    pub id: Uuid,
    pub project_id: Uuid,
    pub visitor_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub status: SessionStatus,
    pub last_message_seq: Option<i64>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisitorSession {
    /// Mark the session closed, stamping `closed_at` and the engagement
    /// duration since it was opened.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Closed;
        self.closed_at = Some(now);
        self.duration_seconds = Some((now - self.created_at).num_seconds());
        self.updated_at = now;
    }
}
