//! WebSocket transport for the room channel.
//!
//! One task per channel. It performs the upgrade handshake (credential in
//! the `Authorization` header), then multiplexes the outbound queue and the
//! inbound stream until either side goes away:
//!
//! ```text
//!   ChannelHandle ──mpsc──► [connection task] ──text frames──► server
//!   ChannelManager ◄─signals─ [connection task] ◄─text frames── server
//! ```
//!
//! Dropping the [`ChannelHandle`] closes the outbound queue; the task sends
//! a close frame and exits.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::channel::{ChannelHandle, ChannelSignal, ConnectRequest, Connector};
use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};

/// Production connector backed by `tokio-tungstenite`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        signals: mpsc::UnboundedSender<ChannelSignal>,
    ) -> ChannelHandle {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let generation = request.generation;
        tokio::spawn(run_connection(request, out_rx, signals));
        ChannelHandle::new(generation, out_tx)
    }
}

/// Build the upgrade request, attaching the bearer credential if present.
pub fn handshake_request(
    request: &ConnectRequest,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, ProtocolError> {
    let mut handshake = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ProtocolError::Handshake(e.to_string()))?;

    if let Some(token) = &request.credential {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ProtocolError::Handshake(e.to_string()))?;
        handshake.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(handshake)
}

async fn run_connection(
    request: ConnectRequest,
    mut outgoing: mpsc::UnboundedReceiver<ClientEvent>,
    signals: mpsc::UnboundedSender<ChannelSignal>,
) {
    let generation = request.generation;

    let handshake = match handshake_request(&request) {
        Ok(handshake) => handshake,
        Err(e) => {
            let _ = signals.send(ChannelSignal::error(generation, e.to_string()));
            return;
        }
    };

    let mut ws = match tokio_tungstenite::connect_async(handshake).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            let _ = signals.send(ChannelSignal::error(generation, e.to_string()));
            return;
        }
    };

    if signals.send(ChannelSignal::opened(generation)).is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = outgoing.recv() => {
                let Some(event) = event else {
                    // Handle dropped: channel released by its owner
                    let _ = ws.close(None).await;
                    log::debug!("Channel #{generation} released");
                    return;
                };
                let text = match event.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        log::warn!("Dropping unencodable event: {e}");
                        continue;
                    }
                };
                log::debug!("→ {text}");
                if let Err(e) = ws.send(Message::Text(text.into())).await {
                    let _ = signals.send(ChannelSignal::error(generation, e.to_string()));
                    return;
                }
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match ServerEvent::decode(text.as_str()) {
                            Ok(event) => {
                                log::debug!("← {}", event.kind().wire_name());
                                if signals.send(ChannelSignal::event(generation, event)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => log::warn!("Ignoring undecodable frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = signals.send(ChannelSignal::closed(generation));
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = signals.send(ChannelSignal::error(generation, e.to_string()));
                        return;
                    }
                }
            }
        }
    }
}
