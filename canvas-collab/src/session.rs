//! Room session controller.
//!
//! ```text
//!   join()          load-code          leave() / teardown
//! Idle ──► Joining ───────────► Joined ───────────► Leaving ──► Idle
//!             │                                        ▲
//!             └──────────── leave() / teardown ────────┘
//! ```
//!
//! Local edits are written to the buffer immediately and transmitted after
//! the buffer has been idle for the debounce window. Nothing is transmitted
//! until the room snapshot has arrived, so an empty pre-snapshot buffer can
//! never overwrite the room's stored content.

use std::time::{Duration, Instant};

use canvas_core::{CodeBuffers, DebounceSet, Language};
use tokio::sync::mpsc;

use crate::channel::ConnectionState;
use crate::protocol::{ClientEvent, CodeChange, EventKind, ServerEvent};
use crate::router::{EventRouter, ListenerId, RouterError};

/// Idle window before a local edit is transmitted.
pub const EDIT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Shown when the room has no stored display name.
pub const UNTITLED_ROOM: &str = "Untitled Room";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    Idle,
    /// `join-room` sent, waiting for the snapshot
    Joining,
    Joined,
    Leaving,
}

/// Where a buffer change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    Local,
    Remote,
    Snapshot,
}

/// Change notification for session observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Joining { room_id: String },
    Joined { room_id: String },
    BufferChanged { language: Language, origin: EditOrigin },
    ParticipantCount(u32),
    RoomName(Option<String>),
    Connection(ConnectionState),
    Left { room_id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("already in room {0}")]
    AlreadyInRoom(String),
    #[error("not in a room")]
    NotInRoom,
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// State of the room currently entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    room_id: String,
    room_name: Option<String>,
    buffers: CodeBuffers,
    participants: u32,
    connection: ConnectionState,
}

impl Session {
    fn new(room_id: String, connection: ConnectionState) -> Self {
        Self {
            room_id,
            room_name: None,
            buffers: CodeBuffers::default(),
            participants: 0,
            connection,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    /// Name shown in the header.
    pub fn display_room_name(&self) -> &str {
        self.room_name.as_deref().unwrap_or(UNTITLED_ROOM)
    }

    pub fn buffers(&self) -> &CodeBuffers {
        &self.buffers
    }

    pub fn participants(&self) -> u32 {
        self.participants
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }
}

/// Drives one room membership at a time over the shared channel.
pub struct RoomSession {
    state: MembershipState,
    session: Option<Session>,
    pending: DebounceSet<Language>,
    listener: Option<ListenerId>,
    connection: ConnectionState,
    observers: Vec<mpsc::UnboundedSender<SessionUpdate>>,
}

impl Default for RoomSession {
    fn default() -> Self {
        Self::new(EDIT_DEBOUNCE)
    }
}

impl RoomSession {
    pub fn new(edit_debounce: Duration) -> Self {
        Self {
            state: MembershipState::Idle,
            session: None,
            pending: DebounceSet::new(edit_debounce),
            listener: None,
            connection: ConnectionState::Disconnected,
            observers: Vec::new(),
        }
    }

    /// Receive every subsequent [`SessionUpdate`].
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Enter `room_id`. Returns the `join-room` event to transmit.
    pub fn join(
        &mut self,
        room_id: &str,
        router: &mut EventRouter,
    ) -> Result<ClientEvent, SessionError> {
        if let Some(session) = &self.session {
            return Err(SessionError::AlreadyInRoom(session.room_id.clone()));
        }
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(SessionError::EmptyRoomId);
        }

        self.listener = Some(router.register(EventKind::SESSION)?);
        self.session = Some(Session::new(room_id.to_string(), self.connection));
        self.state = MembershipState::Joining;
        log::info!("Joining room {room_id}");
        self.notify(SessionUpdate::Joining { room_id: room_id.to_string() });
        Ok(ClientEvent::JoinRoom(room_id.to_string()))
    }

    /// Apply an inbound session event. Returns `true` if any buffer changed.
    pub fn handle_event(&mut self, event: &ServerEvent) -> bool {
        if !matches!(self.state, MembershipState::Joining | MembershipState::Joined) {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        match event {
            ServerEvent::LoadCode(snapshot) => {
                session.buffers = snapshot.clone();
                // Snapshot supersedes anything typed before it
                self.pending.cancel_all();
                let room_id = session.room_id.clone();
                if self.state == MembershipState::Joining {
                    self.state = MembershipState::Joined;
                    log::info!("Joined room {room_id}");
                    self.notify(SessionUpdate::Joined { room_id });
                }
                for language in Language::ALL {
                    self.notify(SessionUpdate::BufferChanged {
                        language,
                        origin: EditOrigin::Snapshot,
                    });
                }
                true
            }
            ServerEvent::CodeUpdate(update) => {
                if update
                    .room_id
                    .as_deref()
                    .is_some_and(|room| room != session.room_id)
                {
                    log::warn!("Ignoring code-update addressed to another room");
                    return false;
                }
                let changed = session.buffers.set(update.language, update.code.clone());
                self.pending.cancel(update.language);
                if changed {
                    log::debug!("Remote update to {} buffer", update.language);
                    self.notify(SessionUpdate::BufferChanged {
                        language: update.language,
                        origin: EditOrigin::Remote,
                    });
                }
                changed
            }
            ServerEvent::UsersInRoom(count) => {
                session.participants = *count;
                self.notify(SessionUpdate::ParticipantCount(*count));
                false
            }
            _ => false,
        }
    }

    /// Capture a local edit.
    ///
    /// The buffer changes immediately. Transmission is scheduled only once
    /// the snapshot has been applied. Returns `true` if the content changed.
    pub fn edit(
        &mut self,
        language: Language,
        content: impl Into<String>,
        now: Instant,
    ) -> Result<bool, SessionError> {
        let session = match (&self.state, self.session.as_mut()) {
            (MembershipState::Joining | MembershipState::Joined, Some(session)) => session,
            _ => return Err(SessionError::NotInRoom),
        };
        if !session.buffers.set(language, content) {
            return Ok(false);
        }
        if self.state == MembershipState::Joined {
            self.pending.schedule(language, now);
        }
        self.notify(SessionUpdate::BufferChanged {
            language,
            origin: EditOrigin::Local,
        });
        Ok(true)
    }

    /// Empty all three buffers as local edits.
    pub fn clear_code(&mut self, now: Instant) -> Result<bool, SessionError> {
        let mut changed = false;
        for language in Language::ALL {
            changed |= self.edit(language, String::new(), now)?;
        }
        Ok(changed)
    }

    /// Emit `code-change` for every buffer whose idle window has elapsed.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<ClientEvent> {
        let due = self.pending.poll_due(now);
        self.changes_for(due)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Leave the room.
    ///
    /// Pending edits are flushed first, then exactly one `leave-room`. Calling
    /// it again (or with no room) returns nothing.
    pub fn leave(&mut self, router: &mut EventRouter) -> Vec<ClientEvent> {
        if self.session.is_none() {
            return Vec::new();
        }
        self.state = MembershipState::Leaving;

        let pending = self.pending.drain();
        let mut events = self.changes_for(pending);

        if let Some(id) = self.listener.take() {
            router.unregister(id);
        }
        if let Some(session) = self.session.take() {
            log::info!("Leaving room {}", session.room_id);
            events.push(ClientEvent::LeaveRoom(session.room_id.clone()));
            self.notify(SessionUpdate::Left { room_id: session.room_id });
        }
        self.state = MembershipState::Idle;
        events
    }

    /// Record the channel state. A disconnect never leaves the room.
    pub fn set_connection(&mut self, state: ConnectionState) {
        if self.connection == state {
            return;
        }
        self.connection = state;
        if let Some(session) = self.session.as_mut() {
            session.connection = state;
        }
        self.notify(SessionUpdate::Connection(state));
    }

    /// Store the display name fetched from the room metadata service.
    pub fn set_room_name(&mut self, name: Option<String>) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NotInRoom)?;
        session.room_name = name.filter(|n| !n.trim().is_empty());
        let name = session.room_name.clone();
        self.notify(SessionUpdate::RoomName(name));
        Ok(())
    }

    pub fn state(&self) -> MembershipState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.room_id.as_str())
    }

    pub fn buffers(&self) -> Option<&CodeBuffers> {
        self.session.as_ref().map(|s| &s.buffers)
    }

    pub fn participants(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.participants)
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_pending(&self, language: Language) -> bool {
        self.pending.is_pending(language)
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }

    fn changes_for(&self, languages: Vec<Language>) -> Vec<ClientEvent> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        languages
            .into_iter()
            .map(|language| {
                ClientEvent::CodeChange(CodeChange {
                    room_id: session.room_id.clone(),
                    language,
                    code: session.buffers.get(language).to_string(),
                })
            })
            .collect()
    }

    fn notify(&mut self, update: SessionUpdate) {
        self.observers.retain(|tx| tx.send(update.clone()).is_ok());
    }
}
