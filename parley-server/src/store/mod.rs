//! Persistence seam for the orchestration subsystems.
//!
//! Explicit queries returning plain value objects — the subsystems never
//! traverse lazy relations, they ask for exactly the rows they need.

mod pg;

pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::models::{MemberType, Platform, Visitor, VisitorSession};
use parley_core::ParleyError;
use uuid::Uuid;

#[async_trait]
pub trait Store: Send + Sync {
    /// Active, non-deleted platforms in assist mode with a positive
    /// fallback timeout.
    async fn assist_platforms(&self) -> Result<Vec<Platform>, ParleyError>;

    /// Visitors on a platform eligible for AI fallback: active, last
    /// message from the visitor and older than `cutoff`, a correlation id
    /// to re-fetch it by, retry budget left, not deleted, AI not disabled.
    async fn fallback_candidates(
        &self,
        platform_id: Uuid,
        cutoff: DateTime<Utc>,
        max_retries: i32,
    ) -> Result<Vec<Visitor>, ParleyError>;

    /// The visitor's open session with an assigned staff member, if any.
    async fn open_staffed_session(
        &self,
        visitor_id: Uuid,
    ) -> Result<Option<VisitorSession>, ParleyError>;

    /// Default AI team of the owning project.
    async fn project_default_team(&self, project_id: Uuid) -> Result<Option<Uuid>, ParleyError>;

    async fn set_fallback_retry_count(
        &self,
        visitor_id: Uuid,
        count: i32,
    ) -> Result<(), ParleyError>;

    async fn increment_fallback_retry(&self, visitor_id: Uuid) -> Result<(), ParleyError>;

    /// Record a successful AI takeover: flip the sender flags to the AI,
    /// store the reply correlation id, reset the retry budget.
    async fn record_fallback_success(
        &self,
        visitor_id: Uuid,
        client_msg_no: &str,
    ) -> Result<(), ParleyError>;

    /// Persist an already-`close()`d session and flip its visitor to
    /// `closed`, in one transaction.
    async fn persist_session_close(&self, session: &VisitorSession) -> Result<(), ParleyError>;

    /// Soft-delete a channel membership row. Returns whether a live row
    /// was found.
    async fn soft_delete_channel_member(
        &self,
        channel_id: &str,
        member_id: Uuid,
        member_type: MemberType,
    ) -> Result<bool, ParleyError>;
}
