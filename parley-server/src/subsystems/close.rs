//! Session close orchestration.
//!
//! Closing a session touches three systems: the relational store, the
//! messaging bus and the staffing queue. The relational write is the
//! source of truth and the only step that may fail the operation; every
//! bus-side step is an independently-guarded cleanup that logs its
//! failure and lets the close proceed.

use chrono::{DateTime, Utc};

use parley_core::bus::MessageBus;
use parley_core::encoding::{
    build_staff_uid, build_visitor_channel_id, CHANNEL_TYPE_CUSTOMER_SERVICE,
};
use parley_core::models::{MemberType, SessionStatus, Staff, VisitorSession};
use parley_core::queue::QueueTrigger;
use parley_core::ParleyError;

use crate::store::Store;

/// Close a visitor session and bring bus state along, best-effort.
///
/// Fails with [`ParleyError::AlreadyClosed`] — and performs no side
/// effects — when the session is already closed. After the relational
/// close commits, the remaining cleanup never aborts the operation.
pub async fn close_visitor_session(
    store: &dyn Store,
    bus: &dyn MessageBus,
    queue: &dyn QueueTrigger,
    mut session: VisitorSession,
    closed_by: Option<&Staff>,
    send_notification: bool,
    reason: Option<&str>,
) -> Result<VisitorSession, ParleyError> {
    if session.status == SessionStatus::Closed {
        return Err(ParleyError::AlreadyClosed);
    }

    let close_reason = reason.unwrap_or(if closed_by.is_some() {
        "by staff"
    } else {
        "unknown"
    });

    tracing::info!(
        session_id = %session.id,
        visitor_id = %session.visitor_id,
        closed_by = ?closed_by.map(|s| s.id),
        reason = close_reason,
        "closing visitor session"
    );

    let channel_id = build_visitor_channel_id(session.visitor_id);

    // 1. Snapshot the channel's last message; the close proceeds without it.
    match bus
        .channel_last_message(&channel_id, CHANNEL_TYPE_CUSTOMER_SERVICE)
        .await
    {
        Ok(Some(last)) => {
            session.last_message_seq = Some(last.message_seq);
            if let Some(ts) = last.timestamp {
                // Bus timestamps are seconds-precision.
                session.last_message_at = DateTime::from_timestamp(ts, 0);
            }
            tracing::debug!(
                session_id = %session.id,
                last_message_seq = last.message_seq,
                "updated session with last message info"
            );
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "failed to get channel last message");
        }
    }

    // 2. Authoritative close: session + visitor in one transaction. All
    //    later steps depend on this committed state.
    let now = Utc::now();
    session.close(now);
    store.persist_session_close(&session).await?;

    tracing::info!(
        session_id = %session.id,
        duration_seconds = session.duration_seconds,
        reason = close_reason,
        "session closed"
    );

    // 3. Staff cleanup: membership row, then bus subscription.
    if let Some(staff_id) = session.staff_id {
        match store
            .soft_delete_channel_member(&channel_id, staff_id, MemberType::Staff)
            .await
        {
            Ok(true) => {
                tracing::info!(%staff_id, %channel_id, "removed staff channel membership")
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(%staff_id, error = %e, "failed to remove staff channel membership")
            }
        }

        let staff_uid = build_staff_uid(staff_id);
        if let Err(e) = bus
            .remove_channel_subscribers(
                &channel_id,
                CHANNEL_TYPE_CUSTOMER_SERVICE,
                &[staff_uid],
            )
            .await
        {
            tracing::warn!(%staff_id, error = %e, "failed to remove staff from bus channel");
        }
    }

    // 4. Closure announcement, as the closing staff member when known.
    if send_notification {
        let staff_uid = closed_by.map(|s| build_staff_uid(s.id));
        let staff_name = closed_by.map(|s| s.display_name().to_string());
        let from_uid = staff_uid.clone().unwrap_or_else(|| "system".to_string());

        if let Err(e) = bus
            .send_session_closed_message(
                &from_uid,
                &channel_id,
                CHANNEL_TYPE_CUSTOMER_SERVICE,
                staff_uid.as_deref(),
                staff_name.as_deref(),
            )
            .await
        {
            tracing::error!(session_id = %session.id, error = %e, "failed to send session closed message");
        }
    }

    // 5. Drop the staff member's private view of the conversation.
    if let Some(staff_id) = session.staff_id {
        let staff_uid = build_staff_uid(staff_id);
        if let Err(e) = bus
            .delete_conversation(&staff_uid, &channel_id, CHANNEL_TYPE_CUSTOMER_SERVICE)
            .await
        {
            tracing::warn!(%staff_id, error = %e, "failed to delete staff conversation");
        }
    }

    // 6. A staffed slot just freed up.
    if let Some(staff_id) = session.staff_id {
        if let Err(e) = queue
            .trigger_queue_for_staff(staff_id, session.project_id)
            .await
        {
            tracing::error!(%staff_id, error = %e, "failed to trigger queue processing");
        }
    }

    Ok(session)
}
