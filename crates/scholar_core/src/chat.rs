//! Conversation state attached to the active workspace.
//!
//! A conversation is either *live* (its session accepts appends) or
//! *restored* (loaded read-only). The first send from a restored conversation
//! forks it: the restored session is replaced by a new live one holding the
//! same history, so exactly one session owns the messages afterwards.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Opaque session identifier. The server hands out integers; they are kept
/// as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => SessionId(n.to_string()),
            Raw::Text(s) => SessionId(s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    /// Creation timestamp, used as the display label.
    #[serde(rename = "created_at")]
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub content: String,
}

impl ChatMessage {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            kind: MessageKind::Text,
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            kind: MessageKind::Text,
            content: content.into(),
        }
    }

    pub fn user_image(reference: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            kind: MessageKind::Image,
            content: reference.into(),
        }
    }
}

/// Not-yet-sent image reference (a local path or a `data:` URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub reference: String,
}

impl PendingAttachment {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// Conversational state the agent endpoint expects back on every turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentContext {
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

/// How the session of an outgoing turn is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPlan {
    /// Delete the restored session, create a live one, copy `history` into it.
    Fork {
        restored: SessionId,
        history: Vec<ChatMessage>,
    },
    /// First message in this context: create a live session.
    Create,
    /// Append to the established live session.
    Existing(SessionId),
}

impl SessionPlan {
    /// Whether executing the plan changes the server's session listing.
    pub fn changes_listing(&self) -> bool {
        !matches!(self, SessionPlan::Existing(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub text: String,
    pub attachments: Vec<PendingAttachment>,
    pub agent: AgentContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: ChatMessage,
    pub agent: AgentContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error("nothing to send")]
    Empty,
    #[error("a message is already being sent")]
    Busy,
    #[error("the restored conversation is still loading")]
    Loading,
    #[error("the conversation agent is not initialized")]
    AgentNotReady,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSessionCoordinator {
    sessions: Vec<SessionSummary>,
    live: Option<SessionId>,
    restored: Option<SessionId>,
    history_pending: bool,
    messages: Vec<ChatMessage>,
    pending: Vec<PendingAttachment>,
    agent: Option<AgentContext>,
    sending: bool,
    turn_changes_listing: bool,
}

impl ChatSessionCoordinator {
    pub fn sessions(&self) -> &[SessionSummary] {
        &self.sessions
    }

    pub fn live_session(&self) -> Option<&SessionId> {
        self.live.as_ref()
    }

    pub fn restored_session(&self) -> Option<&SessionId> {
        self.restored.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending_attachments(&self) -> &[PendingAttachment] {
        &self.pending
    }

    pub fn agent(&self) -> Option<&AgentContext> {
        self.agent.as_ref()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// A restored session whose history has not arrived yet.
    pub fn is_loading_history(&self) -> bool {
        self.history_pending
    }

    /// Drops everything tied to the previous workspace.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Starts a fresh unsaved conversation. Server-side sessions are untouched.
    pub fn reset(&mut self) {
        self.live = None;
        self.restored = None;
        self.history_pending = false;
        self.messages.clear();
        self.pending.clear();
        self.agent = None;
    }

    pub fn set_sessions(&mut self, sessions: Vec<SessionSummary>) {
        self.sessions = sessions;
    }

    pub fn set_agent(&mut self, agent: AgentContext) {
        self.agent = Some(agent);
    }

    /// Marks `session` as restored and clears the displayed messages until
    /// its history arrives.
    pub fn begin_restore(&mut self, session: SessionId) {
        self.messages.clear();
        self.live = None;
        self.restored = Some(session);
        self.history_pending = true;
    }

    /// Applies a loaded history if it still belongs to the restored session.
    pub fn history_loaded(&mut self, session: &SessionId, messages: Vec<ChatMessage>) -> bool {
        if self.restored.as_ref() != Some(session) || self.live.is_some() {
            return false;
        }
        self.messages = messages;
        self.history_pending = false;
        true
    }

    /// Drops the restore of `session` after its history failed to load, so
    /// the next turn starts a fresh conversation instead of forking an empty one.
    pub fn history_failed(&mut self, session: &SessionId) -> bool {
        if self.restored.as_ref() != Some(session) || self.live.is_some() {
            return false;
        }
        self.restored = None;
        self.history_pending = false;
        self.messages.clear();
        true
    }

    pub fn attach(&mut self, attachment: PendingAttachment) {
        self.pending.push(attachment);
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<PendingAttachment> {
        (index < self.pending.len()).then(|| self.pending.remove(index))
    }

    /// Plans an outgoing turn, appends the user's message(s) to the display
    /// list and discards the pending attachments.
    pub fn begin_send(&mut self, text: &str) -> Result<(SessionPlan, ChatTurn), SendRejected> {
        let text = text.trim();
        if text.is_empty() && self.pending.is_empty() {
            return Err(SendRejected::Empty);
        }
        if self.sending {
            return Err(SendRejected::Busy);
        }
        if self.history_pending {
            return Err(SendRejected::Loading);
        }
        let agent = self.agent.clone().ok_or(SendRejected::AgentNotReady)?;

        let plan = match (&self.live, &self.restored) {
            (Some(live), _) => SessionPlan::Existing(live.clone()),
            (None, Some(restored)) => SessionPlan::Fork {
                restored: restored.clone(),
                history: self.messages.clone(),
            },
            (None, None) => SessionPlan::Create,
        };

        let attachments = std::mem::take(&mut self.pending);
        if !text.is_empty() {
            self.messages.push(ChatMessage::user_text(text));
        }
        for attachment in &attachments {
            self.messages
                .push(ChatMessage::user_image(attachment.reference.clone()));
        }

        self.sending = true;
        self.turn_changes_listing = plan.changes_listing();
        Ok((
            plan,
            ChatTurn {
                text: text.to_string(),
                attachments,
                agent,
            },
        ))
    }

    /// The turn's session now exists server-side and is the live one.
    pub fn session_established(&mut self, session: SessionId) {
        self.live = Some(session);
        self.restored = None;
        self.history_pending = false;
    }

    /// Appends the assistant's reply. Returns whether the session listing
    /// should be refreshed.
    pub fn reply_received(&mut self, reply: ChatReply) -> bool {
        self.messages.push(reply.message);
        self.agent = Some(reply.agent);
        self.finish_turn()
    }

    /// Ends a failed turn, keeping whatever was already committed. Returns
    /// whether the session listing should be refreshed.
    pub fn send_failed(&mut self) -> bool {
        self.finish_turn()
    }

    fn finish_turn(&mut self) -> bool {
        self.sending = false;
        std::mem::take(&mut self.turn_changes_listing)
    }
}
