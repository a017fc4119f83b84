//! Chat transcript for a session.
//!
//! Each generation request produces one user message and one assistant
//! message per requested output. Task updates reach the transcript by
//! message id; an assistant message settles exactly once, either with the
//! media URL or with the failure reason.

use canvas::doc::ItemStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Generation status; `None` for plain user messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Media URLs attached to this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>, images: Vec<String>) -> Self {
        Self { id: Uuid::new_v4().to_string(), role: Role::User, content: content.into(), images, ..Self::default() }
    }

    /// Assistant message awaiting a generation result.
    #[must_use]
    pub fn pending_assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            status: Some(ItemStatus::Queued),
            progress: Some(0),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status.is_some_and(ItemStatus::is_terminal)
    }
}

/// Ordered message list of one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Replace the whole transcript, as on hydration.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Record progress for a pending message. Settled messages and
    /// backwards status moves are ignored. Returns whether anything changed.
    pub fn set_progress(&mut self, id: &str, status: ItemStatus, progress: u8) -> bool {
        let Some(message) = self.get_mut(id) else {
            return false;
        };
        let current = message.status.unwrap_or(ItemStatus::Queued);
        if message.is_settled() || !current.can_advance_to(status) || status.is_terminal() {
            return false;
        }
        message.status = Some(status);
        message.progress = Some(progress.min(100));
        true
    }

    /// Settle a message as completed with its media URL.
    pub fn complete(&mut self, id: &str, url: impl Into<String>) -> bool {
        let Some(message) = self.get_mut(id) else {
            return false;
        };
        if message.is_settled() {
            return false;
        }
        message.status = Some(ItemStatus::Completed);
        message.progress = Some(100);
        message.images.push(url.into());
        message.error = None;
        true
    }

    /// Settle a message as failed, keeping the reason.
    pub fn fail(&mut self, id: &str, reason: impl Into<String>) -> bool {
        let Some(message) = self.get_mut(id) else {
            return false;
        };
        if message.is_settled() {
            return false;
        }
        message.status = Some(ItemStatus::Failed);
        message.error = Some(reason.into());
        true
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
