//! Event vocabulary spoken over the room channel.
//!
//! Wire format (one JSON text frame per event):
//! ```text
//! { "event": "<kebab-case name>", "data": <payload> }
//! ```
//!
//! Events carry no clock and no sequence number. Ordering is whatever the
//! transport delivers, so two updates for the same buffer that arrive out
//! of order leave the older content in place.

use canvas_core::{CodeBuffers, Language};
use serde::{Deserialize, Serialize};

/// Outbound per-buffer change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    pub room_id: String,
    pub language: Language,
    pub code: String,
}

/// Inbound per-buffer update relayed from another participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub language: Language,
    pub code: String,
}

/// Anonymous display-name claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameClaim {
    pub room_id: String,
    pub username: String,
}

/// Outbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSend {
    pub room_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernamePayload {
    pub username: String,
}

/// Inbound chat message as relayed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub username: String,
    pub message: String,
    /// Sender-side wall clock in milliseconds. Display only, never used for ordering.
    #[serde(default)]
    pub timestamp: u64,
    /// Set by the server on the copy echoed back to the author.
    #[serde(default)]
    pub is_own: bool,
}

/// Events sent by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Request membership and the buffer snapshot
    JoinRoom(String),
    /// Voluntary departure
    LeaveRoom(String),
    CodeChange(CodeChange),
    SetUsername(UsernameClaim),
    SendMessage(ChatSend),
}

/// Events received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Initial snapshot of all three buffers, once per join
    LoadCode(CodeBuffers),
    CodeUpdate(CodeUpdate),
    /// Participant count refresh
    UsersInRoom(u32),
    UsernameAutoSet(UsernamePayload),
    UsernameAccepted(Option<UsernamePayload>),
    UsernameTaken(Option<UsernamePayload>),
    ChatMessage(ChatPayload),
    UserJoinedChat(UsernamePayload),
    UserLeftChat(UsernamePayload),
}

/// Discriminant of [`ServerEvent`], used for listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    LoadCode,
    CodeUpdate,
    UsersInRoom,
    UsernameAutoSet,
    UsernameAccepted,
    UsernameTaken,
    ChatMessage,
    UserJoinedChat,
    UserLeftChat,
}

impl EventKind {
    /// Kinds consumed by the room session.
    pub const SESSION: &'static [EventKind] = &[
        EventKind::LoadCode,
        EventKind::CodeUpdate,
        EventKind::UsersInRoom,
    ];

    /// Kinds consumed by chat, identity resolution included.
    pub const CHAT: &'static [EventKind] = &[
        EventKind::UsernameAutoSet,
        EventKind::UsernameAccepted,
        EventKind::UsernameTaken,
        EventKind::ChatMessage,
        EventKind::UserJoinedChat,
        EventKind::UserLeftChat,
    ];

    /// Event name on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventKind::LoadCode => "load-code",
            EventKind::CodeUpdate => "code-update",
            EventKind::UsersInRoom => "users-in-room",
            EventKind::UsernameAutoSet => "username-auto-set",
            EventKind::UsernameAccepted => "username-accepted",
            EventKind::UsernameTaken => "username-taken",
            EventKind::ChatMessage => "chat-message",
            EventKind::UserJoinedChat => "user-joined-chat",
            EventKind::UserLeftChat => "user-left-chat",
        }
    }
}

impl ClientEvent {
    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Parse a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializationError(e.to_string()))
    }

    /// Room the event is addressed to.
    pub fn room_id(&self) -> &str {
        match self {
            ClientEvent::JoinRoom(room) | ClientEvent::LeaveRoom(room) => room,
            ClientEvent::CodeChange(change) => &change.room_id,
            ClientEvent::SetUsername(claim) => &claim.room_id,
            ClientEvent::SendMessage(send) => &send.room_id,
        }
    }
}

impl ServerEvent {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializationError(e.to_string()))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::LoadCode(_) => EventKind::LoadCode,
            ServerEvent::CodeUpdate(_) => EventKind::CodeUpdate,
            ServerEvent::UsersInRoom(_) => EventKind::UsersInRoom,
            ServerEvent::UsernameAutoSet(_) => EventKind::UsernameAutoSet,
            ServerEvent::UsernameAccepted(_) => EventKind::UsernameAccepted,
            ServerEvent::UsernameTaken(_) => EventKind::UsernameTaken,
            ServerEvent::ChatMessage(_) => EventKind::ChatMessage,
            ServerEvent::UserJoinedChat(_) => EventKind::UserJoinedChat,
            ServerEvent::UserLeftChat(_) => EventKind::UserLeftChat,
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    /// The handshake could not be built or was refused
    Handshake(String),
    /// No channel is open, or it was torn down
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::Handshake(e) => write!(f, "Handshake error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
