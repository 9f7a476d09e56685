//! Automatic AI takeover for stalled assist-mode conversations.
//!
//! A single background loop periodically scans assist-mode platforms for
//! visitors whose last message came from the visitor, went unanswered past
//! the tenant's timeout, and still has retry budget left. Each candidate is
//! processed sequentially: the stalled message is re-fetched from the bus,
//! the AI is invoked as the assigned staff member and awaited, and the
//! visitor row is updated so the same message cannot trigger twice.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use parley_core::ai::{AiFallbackRequest, AiResponder};
use parley_core::bus::MessageBus;
use parley_core::encoding::{
    build_staff_uid, build_visitor_channel_id, session_id, CHANNEL_TYPE_CUSTOMER_SERVICE,
};
use parley_core::models::{Platform, Visitor, MAX_AI_FALLBACK_RETRIES};
use parley_core::ParleyError;

use crate::store::Store;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Report from one reconciliation sweep.
#[derive(Debug, Clone, Default)]
pub struct FallbackSweepReport {
    pub platforms_scanned: usize,
    pub candidates: usize,
    pub completed: usize,
    pub exhausted: usize,
    pub retried: usize,
    pub failed: usize,
}

enum CandidateOutcome {
    /// AI answered; visitor flags flipped, retry budget reset.
    Completed,
    /// Permanently unrecoverable; retry count forced to the maximum.
    Exhausted,
    /// Transient failure; retry count incremented.
    Retried,
}

/// Handle for the background fallback loop, owned by the composition root.
pub struct FallbackScheduler {
    store: Arc<dyn Store>,
    bus: Arc<dyn MessageBus>,
    ai: Arc<dyn AiResponder>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<broadcast::Sender<()>>,
}

impl FallbackScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        bus: Arc<dyn MessageBus>,
        ai: Arc<dyn AiResponder>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            ai,
            interval,
            handle: None,
            shutdown: None,
        }
    }

    /// Spawn the background loop. Starting a running scheduler is a no-op.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let (tx, rx) = broadcast::channel(1);
        let store = Arc::clone(&self.store);
        let bus = Arc::clone(&self.bus);
        let ai = Arc::clone(&self.ai);
        let interval = self.interval;

        self.handle = Some(tokio::spawn(async move {
            run_fallback_loop(store, bus, ai, interval, rx).await;
        }));
        self.shutdown = Some(tx);

        tracing::info!(
            interval_seconds = self.interval.as_secs(),
            "fallback scheduler started"
        );
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancel the in-flight wait, await the task, clear loop state.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "fallback scheduler task ended abnormally");
            }
            tracing::info!("fallback scheduler stopped");
        }
    }
}

/// The periodic loop. Ticks are strictly sequential: a sweep runs to
/// completion before the next interval wait begins, and a sweep error
/// never terminates the loop.
pub async fn run_fallback_loop(
    store: Arc<dyn Store>,
    bus: Arc<dyn MessageBus>,
    ai: Arc<dyn AiResponder>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_fallback_sweep(store.as_ref(), bus.as_ref(), ai.as_ref()).await {
                    Ok(report) => {
                        if report.candidates > 0 {
                            tracing::info!(
                                platforms = report.platforms_scanned,
                                candidates = report.candidates,
                                completed = report.completed,
                                exhausted = report.exhausted,
                                retried = report.retried,
                                failed = report.failed,
                                "fallback sweep complete"
                            );
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "error in fallback sweep"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("fallback loop shutting down");
                break;
            }
        }
    }
}

/// Run one reconciliation sweep over all assist-mode platforms.
pub async fn run_fallback_sweep(
    store: &dyn Store,
    bus: &dyn MessageBus,
    ai: &dyn AiResponder,
) -> Result<FallbackSweepReport> {
    let mut report = FallbackSweepReport::default();

    let platforms = store.assist_platforms().await?;
    for platform in &platforms {
        report.platforms_scanned += 1;

        let cutoff = Utc::now() - chrono::Duration::seconds(platform.fallback_to_ai_timeout as i64);
        let visitors = store
            .fallback_candidates(platform.id, cutoff, MAX_AI_FALLBACK_RETRIES)
            .await?;

        for visitor in &visitors {
            report.candidates += 1;
            match process_candidate(store, bus, ai, platform, visitor).await {
                Ok(CandidateOutcome::Completed) => report.completed += 1,
                Ok(CandidateOutcome::Exhausted) => report.exhausted += 1,
                Ok(CandidateOutcome::Retried) => report.retried += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        visitor_id = %visitor.id,
                        error = %e,
                        "failed to process fallback candidate"
                    );
                }
            }
        }
    }

    Ok(report)
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

async fn process_candidate(
    store: &dyn Store,
    bus: &dyn MessageBus,
    ai: &dyn AiResponder,
    platform: &Platform,
    visitor: &Visitor,
) -> Result<CandidateOutcome, ParleyError> {
    tracing::info!(
        visitor_id = %visitor.id,
        platform = %platform.name,
        "triggering AI fallback"
    );

    let channel_id = build_visitor_channel_id(visitor.id);

    let Some(last_client_msg_no) = visitor.last_client_msg_no.as_deref() else {
        // The candidate query guarantees this; a violation is unrecoverable.
        store
            .set_fallback_retry_count(visitor.id, MAX_AI_FALLBACK_RETRIES)
            .await?;
        return Ok(CandidateOutcome::Exhausted);
    };

    // Re-fetch the stalled message. A vanished or empty message can never
    // be answered, so stop retrying it.
    let message = bus
        .message_by_client_msg_no(&channel_id, CHANNEL_TYPE_CUSTOMER_SERVICE, last_client_msg_no)
        .await
        .map_err(|e| ParleyError::External(format!("message lookup failed: {e}")))?;

    let content = message
        .and_then(|m| m.payload.content)
        .unwrap_or_default();
    if content.is_empty() {
        tracing::warn!(
            visitor_id = %visitor.id,
            client_msg_no = last_client_msg_no,
            "stalled message missing or empty, disabling further fallback attempts"
        );
        store
            .set_fallback_retry_count(visitor.id, MAX_AI_FALLBACK_RETRIES)
            .await?;
        return Ok(CandidateOutcome::Exhausted);
    }

    // The AI answers as the assigned staff member. With nobody assigned
    // there is no identity to speak as, so the candidate is retired rather
    // than answered by an anonymous actor.
    let staffed_session = store.open_staffed_session(visitor.id).await?;
    let Some(staff_id) = staffed_session.and_then(|s| s.staff_id) else {
        tracing::warn!(
            visitor_id = %visitor.id,
            "no staffed session to speak as, disabling further fallback attempts"
        );
        store
            .set_fallback_retry_count(visitor.id, MAX_AI_FALLBACK_RETRIES)
            .await?;
        return Ok(CandidateOutcome::Exhausted);
    };

    let from_uid = build_staff_uid(staff_id);
    let response_client_msg_no = format!("ai_fallback_{}", Uuid::new_v4().simple());

    let team_id = store
        .project_default_team(platform.project_id)
        .await?
        .map(|id| id.to_string())
        .unwrap_or_else(|| "default".to_string());

    let request = AiFallbackRequest {
        project_id: platform.project_id,
        visitor_id: visitor.id,
        message: content,
        channel_id: channel_id.clone(),
        channel_type: CHANNEL_TYPE_CUSTOMER_SERVICE,
        client_msg_no: response_client_msg_no.clone(),
        session_id: session_id(&from_uid, &channel_id, CHANNEL_TYPE_CUSTOMER_SERVICE),
        from_uid,
        team_id,
        agent_ids: platform.agent_ids.clone(),
    };

    match ai.handle_ai_response(&request).await {
        Ok(Some(result)) if !result.is_empty() => {
            // Flipping the sender flags and replacing the correlation id is
            // what keeps the next tick from answering the same message again.
            store
                .record_fallback_success(visitor.id, &response_client_msg_no)
                .await?;
            tracing::info!(visitor_id = %visitor.id, "AI fallback completed");
            Ok(CandidateOutcome::Completed)
        }
        Ok(_) => {
            tracing::warn!(
                visitor_id = %visitor.id,
                "AI fallback returned no result, incrementing retry count"
            );
            store.increment_fallback_retry(visitor.id).await?;
            Ok(CandidateOutcome::Retried)
        }
        Err(e) => {
            tracing::error!(visitor_id = %visitor.id, error = %e, "AI fallback failed");
            store.increment_fallback_retry(visitor.id).await?;
            Ok(CandidateOutcome::Retried)
        }
    }
}
