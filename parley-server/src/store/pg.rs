use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use parley_core::models::{MemberType, Platform, ServiceStatus, Visitor, VisitorSession};
use parley_core::ParleyError;

use super::Store;

const VISITOR_COLUMNS: &str = "id, project_id, platform_id, service_status, \
     is_last_message_from_visitor, is_last_message_from_ai, last_message_at, \
     last_message_seq, last_client_msg_no, ai_fallback_retry_count, ai_disabled, \
     created_at, updated_at, deleted_at";

const SESSION_COLUMNS: &str = "id, project_id, visitor_id, staff_id, status, \
     last_message_seq, last_message_at, closed_at, duration_seconds, \
     created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn assist_platforms(&self) -> Result<Vec<Platform>, ParleyError> {
        let platforms = sqlx::query_as::<_, Platform>(
            r#"
            SELECT id, project_id, name, ai_mode, fallback_to_ai_timeout, agent_ids,
                   is_active, created_at, updated_at, deleted_at
            FROM platforms
            WHERE ai_mode = 'assist'
              AND fallback_to_ai_timeout > 0
              AND is_active = TRUE
              AND deleted_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(platforms)
    }

    async fn fallback_candidates(
        &self,
        platform_id: Uuid,
        cutoff: DateTime<Utc>,
        max_retries: i32,
    ) -> Result<Vec<Visitor>, ParleyError> {
        let visitors = sqlx::query_as::<_, Visitor>(&format!(
            r#"
            SELECT {VISITOR_COLUMNS}
            FROM visitors
            WHERE platform_id = $1
              AND service_status = 'active'
              AND is_last_message_from_visitor = TRUE
              AND last_message_at < $2
              AND last_client_msg_no IS NOT NULL
              AND ai_fallback_retry_count < $3
              AND deleted_at IS NULL
              AND ai_disabled IS DISTINCT FROM TRUE
            ORDER BY last_message_at
            "#
        ))
        .bind(platform_id)
        .bind(cutoff)
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;

        Ok(visitors)
    }

    async fn open_staffed_session(
        &self,
        visitor_id: Uuid,
    ) -> Result<Option<VisitorSession>, ParleyError> {
        let session = sqlx::query_as::<_, VisitorSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM visitor_sessions
            WHERE visitor_id = $1
              AND status = 'open'
              AND staff_id IS NOT NULL
            LIMIT 1
            "#
        ))
        .bind(visitor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn project_default_team(&self, project_id: Uuid) -> Result<Option<Uuid>, ParleyError> {
        let team: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT default_team_id FROM projects WHERE id = $1")
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(team.flatten())
    }

    async fn set_fallback_retry_count(
        &self,
        visitor_id: Uuid,
        count: i32,
    ) -> Result<(), ParleyError> {
        sqlx::query(
            "UPDATE visitors SET ai_fallback_retry_count = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(visitor_id)
        .bind(count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_fallback_retry(&self, visitor_id: Uuid) -> Result<(), ParleyError> {
        sqlx::query(
            "UPDATE visitors \
             SET ai_fallback_retry_count = ai_fallback_retry_count + 1, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(visitor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_fallback_success(
        &self,
        visitor_id: Uuid,
        client_msg_no: &str,
    ) -> Result<(), ParleyError> {
        sqlx::query(
            "UPDATE visitors \
             SET is_last_message_from_ai = TRUE, \
                 is_last_message_from_visitor = FALSE, \
                 last_client_msg_no = $2, \
                 ai_fallback_retry_count = 0, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(visitor_id)
        .bind(client_msg_no)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn persist_session_close(&self, session: &VisitorSession) -> Result<(), ParleyError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE visitor_sessions \
             SET status = $2, closed_at = $3, duration_seconds = $4, \
                 last_message_seq = $5, last_message_at = $6, updated_at = $7 \
             WHERE id = $1",
        )
        .bind(session.id)
        .bind(session.status)
        .bind(session.closed_at)
        .bind(session.duration_seconds)
        .bind(session.last_message_seq)
        .bind(session.last_message_at)
        .bind(session.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE visitors SET service_status = $2, updated_at = $3 WHERE id = $1")
            .bind(session.visitor_id)
            .bind(ServiceStatus::Closed)
            .bind(session.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn soft_delete_channel_member(
        &self,
        channel_id: &str,
        member_id: Uuid,
        member_type: MemberType,
    ) -> Result<bool, ParleyError> {
        let result = sqlx::query(
            "UPDATE channel_members \
             SET deleted_at = NOW() \
             WHERE channel_id = $1 AND member_id = $2 AND member_type = $3 \
               AND deleted_at IS NULL",
        )
        .bind(channel_id)
        .bind(member_id)
        .bind(member_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
