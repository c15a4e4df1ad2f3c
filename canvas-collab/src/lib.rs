//! # canvas-collab: Real-time room synchronization for Code Canvas
//!
//! Keeps three shared buffers, the participant count and the room chat in
//! step with a remote room over one duplex event channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   JSON text frames   ┌──────────────┐
//! │  RoomClient  │ ◄──────────────────► │ Room server  │
//! │ (select loop)│   {event, data}      │  (external)  │
//! └──────┬───────┘                      └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐     ┌──────────────┐
//! │ChannelManager│ ──► │ EventRouter  │
//! │ (generation) │     └──┬────────┬──┘
//! └──────────────┘        │        │
//!                         ▼        ▼
//!              ┌──────────────┐ ┌──────────────┐
//!              │ RoomSession  │ │   ChatRoom   │
//!              │ (debounce)   │ │ (+ identity) │
//!              └──────────────┘ └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Event vocabulary and JSON codec
//! - [`router`]: Disjoint listener registration per event kind
//! - [`channel`]: Channel lifecycle, credential-driven reopen, stale-signal filtering
//! - [`transport`]: WebSocket connector
//! - [`memory`]: In-process connector for tests and tooling
//! - [`session`]: Join/leave, snapshot gate, debounced outbound edits
//! - [`identity`]: Display-name negotiation
//! - [`chat`]: Receipt-ordered transcript
//! - [`notice`]: Transient notices
//! - [`client`]: The driver tying it all together
//!
//! Delivery is at-most-once and unordered; the last update observed for a
//! buffer wins.

pub mod channel;
pub mod chat;
pub mod client;
pub mod identity;
pub mod memory;
pub mod notice;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use channel::{
    ChannelHandle, ChannelManager, ChannelSignal, ConnectRequest, ConnectionState, Connector,
    SignalKind,
};
pub use chat::{ChatError, ChatMessage, ChatRoom, ChatUpdate, MessageKind, MAX_MESSAGE_LEN};
pub use client::{ClientConfig, ClientError, ClientUpdate, Command, RoomClient};
pub use identity::{
    ClaimRejection, ClaimState, Identity, IdentityError, IdentityNegotiator, IdentityOutcome,
    MAX_NAME_LEN,
};
pub use memory::MemoryConnector;
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use protocol::{ClientEvent, EventKind, ProtocolError, ServerEvent};
pub use router::{EventRouter, ListenerId, RouterError};
pub use session::{
    EditOrigin, MembershipState, RoomSession, Session, SessionError, SessionUpdate,
    EDIT_DEBOUNCE,
};
pub use transport::WebSocketConnector;
