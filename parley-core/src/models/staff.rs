use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The subset of a staff record the close orchestration needs to announce
/// who ended a session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Staff {
    pub id: Uuid,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub username: String,
}

impl Staff {
    /// Display name shown on system messages: name, else nickname, else
    /// username.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.nickname.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.username)
    }
}
