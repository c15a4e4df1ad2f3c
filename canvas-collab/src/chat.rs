//! Room chat.
//!
//! The transcript is append-only in the order events arrive. Timestamps are
//! carried for display and never used to reorder. Leaving the room, or
//! attaching to a different one, clears it.

use std::time::Instant;

use crate::identity::{IdentityError, IdentityNegotiator, IdentityOutcome};
use crate::protocol::{ChatSend, ClientEvent, EventKind, ServerEvent};
use crate::router::{EventRouter, ListenerId, RouterError};

/// Longest message body accepted by the composer, in characters.
pub const MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Empty for system notices
    pub author: String,
    pub body: String,
    pub timestamp_millis: u64,
    pub kind: MessageKind,
    pub is_own: bool,
}

impl ChatMessage {
    pub fn user(author: impl Into<String>, body: impl Into<String>, timestamp_millis: u64) -> Self {
        Self {
            author: author.into(),
            body: body.into(),
            timestamp_millis,
            kind: MessageKind::User,
            is_own: false,
        }
    }

    pub fn system(body: impl Into<String>, timestamp_millis: u64) -> Self {
        Self {
            author: String::new(),
            body: body.into(),
            timestamp_millis,
            kind: MessageKind::System,
            is_own: false,
        }
    }
}

/// What changed after an inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    Appended(ChatMessage),
    Identity(IdentityOutcome),
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Message exceeds {} characters", MAX_MESSAGE_LEN)]
    MessageTooLong,
    #[error("Set a username before chatting")]
    IdentityUnresolved,
    #[error("not in a room")]
    NotInRoom,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Router(#[from] RouterError),
}

pub struct ChatRoom {
    room_id: Option<String>,
    listener: Option<ListenerId>,
    identity: IdentityNegotiator,
    transcript: Vec<ChatMessage>,
}

impl ChatRoom {
    pub fn new(identity: IdentityNegotiator) -> Self {
        Self {
            room_id: None,
            listener: None,
            identity,
            transcript: Vec::new(),
        }
    }

    /// Start receiving chat for `room_id`.
    ///
    /// Attaching to a different room clears the transcript and the identity.
    pub fn attach(&mut self, room_id: &str, router: &mut EventRouter) -> Result<(), ChatError> {
        if self.room_id.as_deref() == Some(room_id) {
            return Ok(());
        }
        self.detach(router);
        self.listener = Some(router.register(EventKind::CHAT)?);
        self.room_id = Some(room_id.to_string());
        Ok(())
    }

    /// Stop receiving chat and clear the transcript.
    pub fn detach(&mut self, router: &mut EventRouter) {
        if let Some(id) = self.listener.take() {
            router.unregister(id);
        }
        if self.room_id.take().is_some() {
            let authenticated = self.identity.identity().is_authenticated;
            self.identity.reset(authenticated);
        }
        self.transcript.clear();
    }

    /// Claim a display name for this room.
    pub fn claim_name(&mut self, name: &str, now: Instant) -> Result<ClientEvent, ChatError> {
        let room_id = self.room_id.as_deref().ok_or(ChatError::NotInRoom)?;
        Ok(self.identity.claim(room_id, name, now)?)
    }

    /// Compose a `send-message` event.
    ///
    /// Nothing is appended locally; the server echoes the message back.
    pub fn send(&self, body: &str) -> Result<ClientEvent, ChatError> {
        let room_id = self.room_id.as_deref().ok_or(ChatError::NotInRoom)?;
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::MessageTooLong);
        }
        if !self.identity.is_resolved() {
            return Err(ChatError::IdentityUnresolved);
        }
        Ok(ClientEvent::SendMessage(ChatSend {
            room_id: room_id.to_string(),
            message: body.to_string(),
        }))
    }

    /// Cut a draft down to the composer limit.
    pub fn clamp_draft(draft: &str) -> &str {
        match draft.char_indices().nth(MAX_MESSAGE_LEN) {
            Some((index, _)) => &draft[..index],
            None => draft,
        }
    }

    /// Apply an inbound chat or identity event.
    ///
    /// `now_millis` stamps join/leave notices.
    pub fn handle_event(&mut self, event: &ServerEvent, now_millis: u64) -> Option<ChatUpdate> {
        self.room_id.as_ref()?;

        let message = match event {
            ServerEvent::UsernameAutoSet(_)
            | ServerEvent::UsernameAccepted(_)
            | ServerEvent::UsernameTaken(_) => {
                return self.identity.handle_event(event).map(ChatUpdate::Identity);
            }
            ServerEvent::ChatMessage(payload) => ChatMessage {
                author: payload.username.clone(),
                body: payload.message.clone(),
                timestamp_millis: payload.timestamp,
                kind: MessageKind::User,
                is_own: payload.is_own,
            },
            ServerEvent::UserJoinedChat(payload) => {
                ChatMessage::system(format!("{} joined the room", payload.username), now_millis)
            }
            ServerEvent::UserLeftChat(payload) => {
                ChatMessage::system(format!("{} left the room", payload.username), now_millis)
            }
            _ => return None,
        };

        self.transcript.push(message.clone());
        Some(ChatUpdate::Appended(message))
    }

    pub fn poll_timers(&mut self, now: Instant) -> Option<ChatUpdate> {
        self.identity.poll_timeout(now).map(ChatUpdate::Identity)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.identity.next_deadline()
    }

    /// Forget the identity after the channel was replaced.
    pub fn reset_identity(&mut self, authenticated: bool) {
        self.identity.reset(authenticated);
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn identity(&self) -> &IdentityNegotiator {
        &self.identity
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }
}
