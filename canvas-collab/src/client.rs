//! Room client: wires the channel, session, chat, preview and notices
//! together behind a single control loop.
//!
//! ```text
//!              ┌──────────────── RoomClient::run ────────────────┐
//!  commands ──►│ select! { signal | command | next timer }       │──► ClientUpdate
//!              │                                                 │
//!  signals ───►│ ChannelManager ─► EventRouter ─┬─► RoomSession  │──► SessionUpdate
//!              │                                └─► ChatRoom     │
//!              │ PreviewScheduler · NoticeBoard                  │
//!              └─────────────────────────────────────────────────┘
//! ```
//!
//! Every handler runs to completion before the next input is taken, so the
//! components never see interleaved mutations. All state transitions take an
//! explicit `now`, and the synchronous methods can be driven directly
//! without [`RoomClient::run`].

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use canvas_core::{
    export_buffer, export_document, preview::PREVIEW_DEBOUNCE, CodeBuffers, ExportError, Language,
    PreviewScheduler, DEFAULT_EXPORT_FILENAME,
};
use tokio::sync::{mpsc, watch};

use crate::channel::{ChannelManager, ChannelSignal, ConnectionState, Connector};
use crate::chat::{ChatError, ChatRoom, ChatUpdate};
use crate::identity::IdentityNegotiator;
use crate::notice::{Notice, NoticeBoard, NoticeKind, NOTICE_DURATION};
use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};
use crate::router::EventRouter;
use crate::session::{RoomSession, SessionError, SessionUpdate, EDIT_DEBOUNCE};
use crate::transport::WebSocketConnector;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Channel endpoint (`ws://` or `wss://`)
    pub server_url: String,
    /// Idle window before a local edit is transmitted
    pub edit_debounce: Duration,
    /// Settle window before the preview is recomposed
    pub preview_debounce: Duration,
    /// Lifetime of transient notices
    pub notice_duration: Duration,
    /// How long to wait for a display-name verdict; `None` waits forever
    pub claim_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:5000".to_string(),
            edit_debounce: EDIT_DEBOUNCE,
            preview_debounce: PREVIEW_DEBOUNCE,
            notice_duration: NOTICE_DURATION,
            claim_timeout: None,
        }
    }
}

/// User intent fed into [`RoomClient::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Login, logout or token refresh
    SetCredential(Option<String>),
    Join {
        room_id: String,
        room_name: Option<String>,
    },
    Leave,
    Edit {
        language: Language,
        content: String,
    },
    ClearCode,
    ClaimName(String),
    SendChat(String),
    Export,
    /// Save a single buffer as `code.<ext>`
    Download(Language),
    SetRoomName(Option<String>),
    /// Surface a message from outside the client (e.g. a metadata call)
    Notify {
        message: String,
        kind: NoticeKind,
    },
    Shutdown,
}

/// Output of the client besides session updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdate {
    Chat(ChatUpdate),
    /// Recomposed preview document
    Preview(String),
    Notice(Notice),
    NoticeCleared,
    Exported { filename: String, document: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub struct RoomClient<C: Connector> {
    config: ClientConfig,
    channel: ChannelManager<C>,
    signal_rx: Option<mpsc::UnboundedReceiver<ChannelSignal>>,
    router: EventRouter,
    session: RoomSession,
    chat: ChatRoom,
    preview: PreviewScheduler,
    notices: NoticeBoard,
    authenticated: bool,
    update_tx: mpsc::UnboundedSender<ClientUpdate>,
    update_rx: Option<mpsc::UnboundedReceiver<ClientUpdate>>,
}

impl RoomClient<WebSocketConnector> {
    /// Client speaking to `config.server_url` over WebSocket.
    pub fn websocket(config: ClientConfig) -> Self {
        Self::new(WebSocketConnector::new(), config)
    }
}

impl<C: Connector> RoomClient<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let mut channel = ChannelManager::new(connector, config.server_url.clone());
        let signal_rx = channel.take_signal_rx();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Self {
            channel,
            signal_rx,
            router: EventRouter::new(),
            session: RoomSession::new(config.edit_debounce),
            chat: ChatRoom::new(IdentityNegotiator::new(false, config.claim_timeout)),
            preview: PreviewScheduler::new(config.preview_debounce),
            notices: NoticeBoard::new(config.notice_duration),
            authenticated: false,
            update_tx,
            update_rx: Some(update_rx),
            config,
        }
    }

    /// Take the update receiver (can only be called once).
    pub fn take_update_rx(&mut self) -> Option<mpsc::UnboundedReceiver<ClientUpdate>> {
        self.update_rx.take()
    }

    pub fn subscribe_session(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        self.session.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.subscribe_state()
    }

    /// Open the channel with the current credential if none is open.
    pub fn connect(&mut self) {
        if !self.channel.is_open() {
            let credential = self.channel.credential().map(String::from);
            self.channel.open(credential);
            self.sync_connection();
        }
    }

    /// Apply a credential change.
    ///
    /// A different credential reopens the channel. When in a room, the room
    /// is left on the old channel and joined again on the new one.
    pub fn set_credential(&mut self, token: Option<String>) -> Result<(), ClientError> {
        self.authenticated = token.is_some();
        if self.channel.is_open() && self.channel.credential() == token.as_deref() {
            return Ok(());
        }

        let rejoin = self.session.session().map(|s| {
            (s.room_id().to_string(), s.room_name().map(String::from))
        });
        if rejoin.is_some() {
            self.leave_session();
        }

        self.channel.refresh_credential(token);
        self.chat.reset_identity(self.authenticated);
        self.sync_connection();

        if let Some((room_id, room_name)) = rejoin {
            let join = self.session.join(&room_id, &mut self.router)?;
            self.session.set_room_name(room_name)?;
            self.transmit(join)?;
        }
        Ok(())
    }

    /// Enter a room, leaving the current one first.
    pub fn join_room(
        &mut self,
        room_id: &str,
        room_name: Option<String>,
    ) -> Result<(), ClientError> {
        if self.session.room_id().is_some_and(|current| current == room_id.trim()) {
            return Ok(());
        }
        self.leave_room();
        self.connect();

        let join = self.session.join(room_id, &mut self.router)?;
        self.session.set_room_name(room_name)?;
        if let Err(e) = self.chat.attach(room_id.trim(), &mut self.router) {
            self.session.leave(&mut self.router);
            return Err(e.into());
        }
        self.transmit(join)?;
        Ok(())
    }

    /// Leave the current room. Returns `false` if not in one.
    pub fn leave_room(&mut self) -> bool {
        let left = self.leave_session();
        self.chat.detach(&mut self.router);
        self.preview.cancel();
        left
    }

    pub fn edit(&mut self, language: Language, content: String, now: Instant) -> Result<(), ClientError> {
        if self.session.edit(language, content, now)? {
            self.preview.invalidate(now);
        }
        Ok(())
    }

    pub fn clear_code(&mut self, now: Instant) -> Result<(), ClientError> {
        if self.session.clear_code(now)? {
            self.preview.invalidate(now);
            self.notify("Code cleared", NoticeKind::Info, now);
        }
        Ok(())
    }

    pub fn claim_name(&mut self, name: &str, now: Instant) -> Result<(), ClientError> {
        let event = self.chat.claim_name(name, now)?;
        self.transmit(event)
    }

    pub fn send_chat(&mut self, body: &str) -> Result<(), ClientError> {
        let event = self.chat.send(body)?;
        self.transmit(event)
    }

    /// Assemble the standalone export of the current buffers.
    pub fn export(&mut self, now: Instant) -> Result<String, ClientError> {
        let empty = CodeBuffers::default();
        let buffers = self.session.buffers().unwrap_or(&empty);
        let document = export_document(buffers)?;
        self.emit(ClientUpdate::Exported {
            filename: DEFAULT_EXPORT_FILENAME.to_string(),
            document: document.clone(),
        });
        self.notify("Code exported successfully!", NoticeKind::Success, now);
        Ok(document)
    }

    /// Hand one buffer out as its own file.
    pub fn download(&mut self, language: Language, now: Instant) -> Result<String, ClientError> {
        let empty = CodeBuffers::default();
        let buffers = self.session.buffers().unwrap_or(&empty);
        let file = export_buffer(language, buffers)?;
        self.emit(ClientUpdate::Exported {
            filename: file.filename.clone(),
            document: file.contents,
        });
        self.notify(
            format!("{} downloaded", language.display_name()),
            NoticeKind::Success,
            now,
        );
        Ok(file.filename)
    }

    pub fn set_room_name(&mut self, name: Option<String>) -> Result<(), ClientError> {
        Ok(self.session.set_room_name(name)?)
    }

    /// Show a transient notice.
    pub fn notify(&mut self, message: impl Into<String>, kind: NoticeKind, now: Instant) {
        let notice = self.notices.show(message, kind, now).clone();
        self.emit(ClientUpdate::Notice(notice));
    }

    /// Apply one transport signal.
    pub fn handle_signal(&mut self, signal: ChannelSignal, now: Instant) {
        if let Some(event) = self.channel.accept(signal) {
            self.dispatch(event, now);
        }
        self.sync_connection();
    }

    /// Apply every signal already queued, without waiting.
    pub fn process_pending_signals(&mut self, now: Instant) -> usize {
        let mut signals = Vec::new();
        if let Some(rx) = self.signal_rx.as_mut() {
            while let Ok(signal) = rx.try_recv() {
                signals.push(signal);
            }
        }
        let count = signals.len();
        for signal in signals {
            self.handle_signal(signal, now);
        }
        count
    }

    /// Fire every timer due at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        for event in self.session.poll_timers(now) {
            if let Err(e) = self.transmit(event) {
                log::warn!("Edit not transmitted: {e}");
            }
        }
        if let Some(update) = self.chat.poll_timers(now) {
            self.emit(ClientUpdate::Chat(update));
        }
        if let Some(buffers) = self.session.buffers() {
            if let Some(document) = self.preview.poll(now, buffers) {
                let document = document.to_string();
                self.emit(ClientUpdate::Preview(document));
            }
        }
        if self.notices.expire(now) {
            self.emit(ClientUpdate::NoticeCleared);
        }
    }

    /// Earliest instant at which [`RoomClient::poll_timers`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.session.next_deadline(),
            self.chat.next_deadline(),
            self.preview.next_deadline(),
            self.notices.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Leave the room and release the channel. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.leave_room();
        if self.channel.close() {
            self.sync_connection();
        }
    }

    /// Apply a command, surfacing failures as error notices.
    pub fn handle_command(&mut self, command: Command, now: Instant) {
        let result = match command {
            Command::SetCredential(token) => self.set_credential(token),
            Command::Join { room_id, room_name } => self.join_room(&room_id, room_name),
            Command::Leave => {
                self.leave_room();
                Ok(())
            }
            Command::Edit { language, content } => self.edit(language, content, now),
            Command::ClearCode => self.clear_code(now),
            Command::ClaimName(name) => self.claim_name(&name, now),
            Command::SendChat(body) => self.send_chat(&body),
            Command::Export => self.export(now).map(|_| ()),
            Command::Download(language) => self.download(language, now).map(|_| ()),
            Command::SetRoomName(name) => self.set_room_name(name),
            Command::Notify { message, kind } => {
                self.notify(message, kind, now);
                Ok(())
            }
            Command::Shutdown => {
                self.teardown();
                Ok(())
            }
        };
        if let Err(e) = result {
            self.notify(e.to_string(), NoticeKind::Error, now);
        }
    }

    /// Drive the client until `commands` closes or yields `Shutdown`.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let Some(mut signals) = self.signal_rx.take() else {
            log::error!("Signal receiver already taken");
            return;
        };
        self.connect();

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                Some(signal) = signals.recv() => {
                    self.handle_signal(signal, Instant::now());
                }
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command, Instant::now()),
                },
                _ = sleep_until(deadline) => {}
            }
            self.poll_timers(Instant::now());
        }

        self.signal_rx = Some(signals);
        self.teardown();
        log::info!("Room client stopped");
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    pub fn chat(&self) -> &ChatRoom {
        &self.chat
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn generation(&self) -> u64 {
        self.channel.generation()
    }

    pub fn preview_document(&self) -> &str {
        self.preview.document()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notices.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn connector(&self) -> &C {
        self.channel.connector()
    }

    fn dispatch(&mut self, event: ServerEvent, now: Instant) {
        let Some(listener) = self.router.route(&event) else {
            log::warn!("No listener for {}", event.kind().wire_name());
            return;
        };

        if Some(listener) == self.session.listener() {
            if self.session.handle_event(&event) {
                self.preview.invalidate(now);
            }
        } else if Some(listener) == self.chat.listener() {
            if let Some(update) = self.chat.handle_event(&event, unix_millis()) {
                self.emit(ClientUpdate::Chat(update));
            }
        } else {
            log::warn!("Dangling listener {listener} for {}", event.kind().wire_name());
        }
    }

    /// Flush and leave on the current channel without touching chat.
    fn leave_session(&mut self) -> bool {
        let events = self.session.leave(&mut self.router);
        let left = !events.is_empty();
        for event in events {
            if let Err(e) = self.transmit(event) {
                log::warn!("Could not send while leaving: {e}");
            }
        }
        left
    }

    fn transmit(&self, event: ClientEvent) -> Result<(), ClientError> {
        Ok(self.channel.send(event)?)
    }

    fn sync_connection(&mut self) {
        self.session.set_connection(self.channel.state());
    }

    fn emit(&self, update: ClientUpdate) {
        let _ = self.update_tx.send(update);
    }
}

impl<C: Connector> Drop for RoomClient<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
