//! In-process connector for driving the client without a network.
//!
//! Each `connect` call records a link. The owner of the connector plays the
//! server: it reads what the client sent and injects lifecycle signals and
//! inbound events stamped with the link's generation.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::channel::{ChannelHandle, ChannelSignal, ConnectRequest, Connector};
use crate::protocol::{ClientEvent, ServerEvent};

struct Link {
    request: ConnectRequest,
    outgoing: mpsc::UnboundedReceiver<ClientEvent>,
    signals: mpsc::UnboundedSender<ChannelSignal>,
    sent: Vec<ClientEvent>,
    released: bool,
}

impl Link {
    /// Move everything queued by the client into `sent`.
    fn pump(&mut self) {
        loop {
            match self.outgoing.try_recv() {
                Ok(event) => self.sent.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.released = true;
                    break;
                }
            }
        }
    }
}

/// Cloneable handle to a set of in-memory links.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    links: Arc<Mutex<Vec<Link>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn links(&self) -> MutexGuard<'_, Vec<Link>> {
        self.links.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of channels opened so far.
    pub fn connection_count(&self) -> usize {
        self.links().len()
    }

    /// Handshake parameters of link `index`.
    pub fn request(&self, index: usize) -> Option<ConnectRequest> {
        self.links().get(index).map(|link| link.request.clone())
    }

    /// Every event the client has sent on link `index`, in send order.
    pub fn sent(&self, index: usize) -> Vec<ClientEvent> {
        let mut links = self.links();
        match links.get_mut(index) {
            Some(link) => {
                link.pump();
                link.sent.clone()
            }
            None => Vec::new(),
        }
    }

    /// Whether the client has dropped its handle for link `index`.
    pub fn is_released(&self, index: usize) -> bool {
        let mut links = self.links();
        match links.get_mut(index) {
            Some(link) => {
                link.pump();
                link.released
            }
            None => false,
        }
    }

    /// Complete the handshake of link `index`.
    pub fn open(&self, index: usize) -> bool {
        self.signal(index, ChannelSignal::opened)
    }

    /// Deliver an inbound event on link `index`.
    pub fn deliver(&self, index: usize, event: ServerEvent) -> bool {
        self.signal(index, |generation| ChannelSignal::event(generation, event))
    }

    /// Peer-initiated close of link `index`.
    pub fn close(&self, index: usize) -> bool {
        self.signal(index, ChannelSignal::closed)
    }

    /// Transport failure on link `index`.
    pub fn fail(&self, index: usize, message: &str) -> bool {
        self.signal(index, |generation| ChannelSignal::error(generation, message))
    }

    fn signal(&self, index: usize, build: impl FnOnce(u64) -> ChannelSignal) -> bool {
        let links = self.links();
        match links.get(index) {
            Some(link) => link.signals.send(build(link.request.generation)).is_ok(),
            None => false,
        }
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        signals: mpsc::UnboundedSender<ChannelSignal>,
    ) -> ChannelHandle {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let generation = request.generation;
        self.links().push(Link {
            request,
            outgoing: out_rx,
            signals,
            sent: Vec::new(),
            released: false,
        });
        ChannelHandle::new(generation, out_tx)
    }
}
