//! In-memory collaborators for exercising the orchestration subsystems
//! without Postgres or live services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use parley_core::ai::{AiError, AiFallbackRequest, AiResponder};
use parley_core::bus::{BusError, BusMessage, ChannelLastMessage, MessageBus, MessagePayload};
use parley_core::models::{
    AiMode, ChannelMember, MemberType, Platform, ServiceStatus, SessionStatus, Staff, Visitor,
    VisitorSession,
};
use parley_core::queue::{QueueError, QueueTrigger};
use parley_core::ParleyError;
use parley_server::store::Store;

// ============================================================================
// Fixtures
// ============================================================================

pub fn make_platform(project_id: Uuid, fallback_to_ai_timeout: i32) -> Platform {
    let now = Utc::now();
    Platform {
        id: Uuid::new_v4(),
        project_id,
        name: "web-widget".to_string(),
        ai_mode: AiMode::Assist,
        fallback_to_ai_timeout,
        agent_ids: None,
        is_active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// A visitor whose last message came from the visitor `stalled_seconds` ago.
pub fn make_stalled_visitor(
    platform: &Platform,
    stalled_seconds: i64,
    client_msg_no: Option<&str>,
) -> Visitor {
    let now = Utc::now();
    Visitor {
        id: Uuid::new_v4(),
        project_id: platform.project_id,
        platform_id: platform.id,
        service_status: ServiceStatus::Active,
        is_last_message_from_visitor: true,
        is_last_message_from_ai: false,
        last_message_at: Some(now - chrono::Duration::seconds(stalled_seconds)),
        last_message_seq: 10,
        last_client_msg_no: client_msg_no.map(str::to_string),
        ai_fallback_retry_count: 0,
        ai_disabled: None,
        created_at: now - chrono::Duration::hours(1),
        updated_at: now,
        deleted_at: None,
    }
}

pub fn make_open_session(visitor: &Visitor, staff_id: Option<Uuid>) -> VisitorSession {
    let opened = Utc::now() - chrono::Duration::seconds(120);
    VisitorSession {
        id: Uuid::new_v4(),
        project_id: visitor.project_id,
        visitor_id: visitor.id,
        staff_id,
        status: SessionStatus::Open,
        last_message_seq: None,
        last_message_at: None,
        closed_at: None,
        duration_seconds: None,
        created_at: opened,
        updated_at: opened,
    }
}

pub fn make_staff(name: &str) -> Staff {
    Staff {
        id: Uuid::new_v4(),
        name: Some(name.to_string()),
        nickname: None,
        username: "agent".to_string(),
    }
}

pub fn make_channel_member(channel_id: &str, member_id: Uuid) -> ChannelMember {
    ChannelMember {
        id: Uuid::new_v4(),
        channel_id: channel_id.to_string(),
        member_id,
        member_type: MemberType::Staff,
        created_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn make_text_message(client_msg_no: &str, content: &str) -> BusMessage {
    BusMessage {
        message_seq: 10,
        client_msg_no: client_msg_no.to_string(),
        payload: MessagePayload {
            message_type: 1,
            content: Some(content.to_string()),
        },
    }
}

// ============================================================================
// MemStore
// ============================================================================

#[derive(Default)]
pub struct MemStore {
    pub platforms: Mutex<Vec<Platform>>,
    pub visitors: Mutex<Vec<Visitor>>,
    pub sessions: Mutex<Vec<VisitorSession>>,
    pub members: Mutex<Vec<ChannelMember>>,
    pub default_teams: Mutex<HashMap<Uuid, Uuid>>,
}

impl MemStore {
    pub fn visitor(&self, id: Uuid) -> Visitor {
        self.visitors
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .expect("visitor seeded")
    }

    pub fn session(&self, id: Uuid) -> VisitorSession {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .expect("session seeded")
    }
}

#[async_trait]
impl Store for MemStore {
    async fn assist_platforms(&self) -> Result<Vec<Platform>, ParleyError> {
        Ok(self
            .platforms
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.ai_mode == AiMode::Assist
                    && p.fallback_to_ai_timeout > 0
                    && p.is_active
                    && p.deleted_at.is_none()
            })
            .cloned()
            .collect())
    }

    async fn fallback_candidates(
        &self,
        platform_id: Uuid,
        cutoff: DateTime<Utc>,
        max_retries: i32,
    ) -> Result<Vec<Visitor>, ParleyError> {
        Ok(self
            .visitors
            .lock()
            .unwrap()
            .iter()
            .filter(|v| {
                v.platform_id == platform_id
                    && v.service_status == ServiceStatus::Active
                    && v.is_last_message_from_visitor
                    && v.last_message_at.map_or(false, |t| t < cutoff)
                    && v.last_client_msg_no.is_some()
                    && v.ai_fallback_retry_count < max_retries
                    && v.deleted_at.is_none()
                    && v.ai_disabled != Some(true)
            })
            .cloned()
            .collect())
    }

    async fn open_staffed_session(
        &self,
        visitor_id: Uuid,
    ) -> Result<Option<VisitorSession>, ParleyError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.visitor_id == visitor_id
                    && s.status == SessionStatus::Open
                    && s.staff_id.is_some()
            })
            .cloned())
    }

    async fn project_default_team(&self, project_id: Uuid) -> Result<Option<Uuid>, ParleyError> {
        Ok(self.default_teams.lock().unwrap().get(&project_id).copied())
    }

    async fn set_fallback_retry_count(
        &self,
        visitor_id: Uuid,
        count: i32,
    ) -> Result<(), ParleyError> {
        for v in self.visitors.lock().unwrap().iter_mut() {
            if v.id == visitor_id {
                v.ai_fallback_retry_count = count;
            }
        }
        Ok(())
    }

    async fn increment_fallback_retry(&self, visitor_id: Uuid) -> Result<(), ParleyError> {
        for v in self.visitors.lock().unwrap().iter_mut() {
            if v.id == visitor_id {
                v.ai_fallback_retry_count += 1;
            }
        }
        Ok(())
    }

    async fn record_fallback_success(
        &self,
        visitor_id: Uuid,
        client_msg_no: &str,
    ) -> Result<(), ParleyError> {
        for v in self.visitors.lock().unwrap().iter_mut() {
            if v.id == visitor_id {
                v.is_last_message_from_ai = true;
                v.is_last_message_from_visitor = false;
                v.last_client_msg_no = Some(client_msg_no.to_string());
                v.ai_fallback_retry_count = 0;
            }
        }
        Ok(())
    }

    async fn persist_session_close(&self, session: &VisitorSession) -> Result<(), ParleyError> {
        for s in self.sessions.lock().unwrap().iter_mut() {
            if s.id == session.id {
                *s = session.clone();
            }
        }
        for v in self.visitors.lock().unwrap().iter_mut() {
            if v.id == session.visitor_id {
                v.service_status = ServiceStatus::Closed;
            }
        }
        Ok(())
    }

    async fn soft_delete_channel_member(
        &self,
        channel_id: &str,
        member_id: Uuid,
        member_type: MemberType,
    ) -> Result<bool, ParleyError> {
        for m in self.members.lock().unwrap().iter_mut() {
            if m.channel_id == channel_id
                && m.member_id == member_id
                && m.member_type == member_type
                && m.deleted_at.is_none()
            {
                m.deleted_at = Some(Utc::now());
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ============================================================================
// MemBus
// ============================================================================

#[derive(Default)]
pub struct MemBus {
    pub last_message: Mutex<Option<ChannelLastMessage>>,
    pub fail_last_message: bool,
    pub messages: Mutex<HashMap<String, BusMessage>>,
    pub last_message_calls: AtomicUsize,
    pub removed_subscribers: Mutex<Vec<(String, Vec<String>)>>,
    pub closed_messages: Mutex<Vec<(String, Option<String>, Option<String>)>>,
    pub deleted_conversations: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessageBus for MemBus {
    async fn channel_last_message(
        &self,
        _channel_id: &str,
        _channel_type: u8,
    ) -> Result<Option<ChannelLastMessage>, BusError> {
        self.last_message_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_last_message {
            return Err(BusError::Api {
                code: 500,
                message: "bus unavailable".to_string(),
            });
        }
        Ok(self.last_message.lock().unwrap().clone())
    }

    async fn message_by_client_msg_no(
        &self,
        _channel_id: &str,
        _channel_type: u8,
        client_msg_no: &str,
    ) -> Result<Option<BusMessage>, BusError> {
        Ok(self.messages.lock().unwrap().get(client_msg_no).cloned())
    }

    async fn remove_channel_subscribers(
        &self,
        channel_id: &str,
        _channel_type: u8,
        subscribers: &[String],
    ) -> Result<(), BusError> {
        self.removed_subscribers
            .lock()
            .unwrap()
            .push((channel_id.to_string(), subscribers.to_vec()));
        Ok(())
    }

    async fn send_session_closed_message(
        &self,
        from_uid: &str,
        _channel_id: &str,
        _channel_type: u8,
        staff_uid: Option<&str>,
        staff_name: Option<&str>,
    ) -> Result<(), BusError> {
        self.closed_messages.lock().unwrap().push((
            from_uid.to_string(),
            staff_uid.map(str::to_string),
            staff_name.map(str::to_string),
        ));
        Ok(())
    }

    async fn delete_conversation(
        &self,
        uid: &str,
        channel_id: &str,
        _channel_type: u8,
    ) -> Result<(), BusError> {
        self.deleted_conversations
            .lock()
            .unwrap()
            .push((uid.to_string(), channel_id.to_string()));
        Ok(())
    }
}

// ============================================================================
// MemAi / MemQueue
// ============================================================================

pub enum AiBehavior {
    Reply(String),
    EmptyReply,
    NoResult,
    Fail,
}

pub struct MemAi {
    pub behavior: Mutex<AiBehavior>,
    pub calls: Mutex<Vec<AiFallbackRequest>>,
}

impl MemAi {
    pub fn new(behavior: AiBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiResponder for MemAi {
    async fn handle_ai_response(
        &self,
        request: &AiFallbackRequest,
    ) -> Result<Option<String>, AiError> {
        self.calls.lock().unwrap().push(request.clone());
        match &*self.behavior.lock().unwrap() {
            AiBehavior::Reply(text) => Ok(Some(text.clone())),
            AiBehavior::EmptyReply => Ok(Some(String::new())),
            AiBehavior::NoResult => Ok(None),
            AiBehavior::Fail => Err(AiError::Api {
                code: 500,
                message: "agent run failed".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct MemQueue {
    pub calls: Mutex<Vec<(Uuid, Uuid)>>,
}

#[async_trait]
impl QueueTrigger for MemQueue {
    async fn trigger_queue_for_staff(
        &self,
        staff_id: Uuid,
        project_id: Uuid,
    ) -> Result<(), QueueError> {
        self.calls.lock().unwrap().push((staff_id, project_id));
        Ok(())
    }
}
