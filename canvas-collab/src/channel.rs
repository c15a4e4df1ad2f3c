//! Channel manager: owns the single duplex event channel.
//!
//! ```text
//!            open(credential)                    Opened
//!  ──────────────────────────► Connecting ──────────────► Connected
//!                                  │                          │
//!                   Error / Closed │                          │ Closed / Error
//!                                  ▼                          ▼
//!                             Disconnected ◄──────────────────┘
//! ```
//!
//! Every channel gets a fresh generation number. Transports stamp the
//! signals they emit with it, and [`ChannelManager::accept`] drops anything
//! stamped with an older generation, so nothing from a replaced channel is
//! applied after a reopen.

use tokio::sync::{mpsc, watch};

use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};

/// Advisory connection state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Lifecycle or payload signal emitted by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSignal {
    /// Generation of the channel that produced the signal
    pub generation: u64,
    pub kind: SignalKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalKind {
    /// Handshake completed
    Opened,
    /// Inbound event
    Event(ServerEvent),
    /// Peer closed the channel
    Closed,
    /// Transport failure (connect error or broken stream)
    Error(String),
}

impl ChannelSignal {
    pub fn opened(generation: u64) -> Self {
        Self { generation, kind: SignalKind::Opened }
    }

    pub fn event(generation: u64, event: ServerEvent) -> Self {
        Self { generation, kind: SignalKind::Event(event) }
    }

    pub fn closed(generation: u64) -> Self {
        Self { generation, kind: SignalKind::Closed }
    }

    pub fn error(generation: u64, message: impl Into<String>) -> Self {
        Self { generation, kind: SignalKind::Error(message.into()) }
    }
}

/// Parameters for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    /// Bearer token carried in the handshake, `None` for anonymous
    pub credential: Option<String>,
    pub generation: u64,
}

/// Owned handle to an open channel.
///
/// Dropping the handle releases the channel: the outbound sender closes and
/// the transport flushes what is queued, then shuts the connection down.
#[derive(Debug)]
pub struct ChannelHandle {
    generation: u64,
    outgoing: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelHandle {
    pub fn new(generation: u64, outgoing: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { generation, outgoing }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue an event for transmission.
    pub fn send(&self, event: ClientEvent) -> Result<(), ProtocolError> {
        self.outgoing
            .send(event)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}

/// Something that can open a channel.
///
/// Implementations spawn whatever drives the connection and report
/// lifecycle and inbound events through `signals`, stamped with
/// `request.generation`.
pub trait Connector {
    fn connect(
        &self,
        request: ConnectRequest,
        signals: mpsc::UnboundedSender<ChannelSignal>,
    ) -> ChannelHandle;
}

/// Owns at most one channel and rebuilds it when the credential changes.
pub struct ChannelManager<C> {
    connector: C,
    url: String,
    signals_tx: mpsc::UnboundedSender<ChannelSignal>,
    signals_rx: Option<mpsc::UnboundedReceiver<ChannelSignal>>,
    current: Option<ChannelHandle>,
    credential: Option<String>,
    generation: u64,
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: Connector> ChannelManager<C> {
    pub fn new(connector: C, url: impl Into<String>) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            url: url.into(),
            signals_tx,
            signals_rx: Some(signals_rx),
            current: None,
            credential: None,
            generation: 0,
            state_tx,
        }
    }

    /// Take the signal receiver (can only be called once).
    pub fn take_signal_rx(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelSignal>> {
        self.signals_rx.take()
    }

    /// Open a channel with `credential`, tearing down any previous one first.
    ///
    /// Returns the generation of the new channel.
    pub fn open(&mut self, credential: Option<String>) -> u64 {
        self.close();

        self.generation += 1;
        self.credential = credential;
        self.set_state(ConnectionState::Connecting);

        let request = ConnectRequest {
            url: self.url.clone(),
            credential: self.credential.clone(),
            generation: self.generation,
        };
        log::info!(
            "Opening channel #{} to {} ({})",
            self.generation,
            self.url,
            if self.credential.is_some() { "authenticated" } else { "anonymous" }
        );
        self.current = Some(self.connector.connect(request, self.signals_tx.clone()));
        self.generation
    }

    /// Close the current channel. Returns `false` if none was open.
    pub fn close(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                log::info!("Closing channel #{}", handle.generation());
                drop(handle);
                self.set_state(ConnectionState::Disconnected);
                true
            }
            None => false,
        }
    }

    /// Reopen if `credential` differs from the one the open channel uses.
    ///
    /// Returns the new generation when a reopen happened.
    pub fn refresh_credential(&mut self, credential: Option<String>) -> Option<u64> {
        if self.current.is_some() && self.credential == credential {
            return None;
        }
        Some(self.open(credential))
    }

    /// Apply a transport signal.
    ///
    /// Returns the inbound event it carries when it belongs to the current
    /// channel. Signals from replaced channels are dropped.
    pub fn accept(&mut self, signal: ChannelSignal) -> Option<ServerEvent> {
        if self.current.is_none() || signal.generation != self.generation {
            log::debug!(
                "Dropping signal from stale channel #{} (current #{})",
                signal.generation,
                self.generation
            );
            return None;
        }

        match signal.kind {
            SignalKind::Opened => {
                log::info!("Channel #{} connected", self.generation);
                self.set_state(ConnectionState::Connected);
                None
            }
            SignalKind::Event(event) => Some(event),
            SignalKind::Closed => {
                log::warn!("Channel #{} disconnected", self.generation);
                self.set_state(ConnectionState::Disconnected);
                None
            }
            SignalKind::Error(message) => {
                log::error!("Channel #{} error: {message}", self.generation);
                self.set_state(ConnectionState::Disconnected);
                None
            }
        }
    }

    /// Queue an event on the current channel.
    pub fn send(&self, event: ClientEvent) -> Result<(), ProtocolError> {
        match &self.current {
            Some(handle) => handle.send(event),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;

    fn manager() -> ChannelManager<MemoryConnector> {
        ChannelManager::new(MemoryConnector::new(), "ws://localhost:5000")
    }

    #[test]
    fn test_initial_state() {
        let mgr = manager();
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(!mgr.is_open());
        assert_eq!(mgr.generation(), 0);
    }

    #[test]
    fn test_open_transitions_to_connecting_then_connected() {
        let mut mgr = manager();
        let generation = mgr.open(None);
        assert_eq!(mgr.state(), ConnectionState::Connecting);

        assert!(mgr.accept(ChannelSignal::opened(generation)).is_none());
        assert_eq!(mgr.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_handshake_carries_credential() {
        let mut mgr = manager();
        mgr.open(Some("tok-1".into()));
        let request = mgr.connector().request(0).unwrap();
        assert_eq!(request.credential.as_deref(), Some("tok-1"));
        assert_eq!(request.url, "ws://localhost:5000");
        assert_eq!(request.generation, 1);
    }

    #[test]
    fn test_reopen_releases_previous_channel() {
        let mut mgr = manager();
        mgr.open(None);
        mgr.open(Some("tok".into()));

        let connector = mgr.connector();
        assert_eq!(connector.connection_count(), 2);
        assert!(connector.is_released(0));
        assert!(!connector.is_released(1));
    }

    #[test]
    fn test_refresh_credential_only_on_change() {
        let mut mgr = manager();
        mgr.open(None);
        assert_eq!(mgr.refresh_credential(None), None);
        assert_eq!(mgr.refresh_credential(Some("t".into())), Some(2));
        assert_eq!(mgr.refresh_credential(Some("t".into())), None);
        // Logout
        assert_eq!(mgr.refresh_credential(None), Some(3));
        assert_eq!(mgr.connector().connection_count(), 3);
    }

    #[test]
    fn test_stale_signals_dropped_after_reopen() {
        let mut mgr = manager();
        let old = mgr.open(None);
        mgr.accept(ChannelSignal::opened(old));
        let new = mgr.open(Some("token".into()));

        let stale = ChannelSignal::event(old, ServerEvent::UsersInRoom(9));
        assert!(mgr.accept(stale).is_none());
        // A stale close must not flip the new channel's state
        mgr.accept(ChannelSignal::opened(new));
        mgr.accept(ChannelSignal::closed(old));
        assert_eq!(mgr.state(), ConnectionState::Connected);

        let fresh = ChannelSignal::event(new, ServerEvent::UsersInRoom(2));
        assert_eq!(mgr.accept(fresh), Some(ServerEvent::UsersInRoom(2)));
    }

    #[test]
    fn test_error_degrades_to_disconnected() {
        let mut mgr = manager();
        let generation = mgr.open(None);
        mgr.accept(ChannelSignal::error(generation, "connection refused"));
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        // Still the current channel; no automatic retry
        assert!(mgr.is_open());
        assert_eq!(mgr.connector().connection_count(), 1);
    }

    #[test]
    fn test_send_without_channel_fails() {
        let mgr = manager();
        assert_eq!(
            mgr.send(ClientEvent::JoinRoom("r".into())),
            Err(ProtocolError::ConnectionClosed)
        );
    }

    #[test]
    fn test_close_sets_disconnected() {
        let mut mgr = manager();
        mgr.open(None);
        assert!(mgr.close());
        assert!(!mgr.close());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(mgr.connector().is_released(0));
    }

    #[tokio::test]
    async fn test_state_is_observable() {
        let mut mgr = manager();
        let mut rx = mgr.subscribe_state();
        let generation = mgr.open(None);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);

        mgr.accept(ChannelSignal::opened(generation));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connected);
    }
}
