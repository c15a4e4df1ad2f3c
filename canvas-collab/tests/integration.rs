//! Integration tests over a real WebSocket.
//!
//! Each test starts a scripted room server on a free port and drives a
//! `RoomClient` through its command loop.

use canvas_collab::chat::ChatUpdate;
use canvas_collab::client::{ClientConfig, ClientUpdate, Command, RoomClient};
use canvas_collab::protocol::{
    ChatPayload, ChatSend, ClientEvent, CodeChange, ServerEvent, UsernameClaim,
};
use canvas_collab::session::{EditOrigin, SessionUpdate};
use canvas_collab::ConnectionState;
use canvas_core::{CodeBuffers, Language};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Server side of the test. `Some(event)` is sent on the current
/// connection, `None` closes it.
struct ScriptedPeer {
    url: String,
    inbound: mpsc::UnboundedReceiver<(usize, ClientEvent)>,
    outbound: mpsc::UnboundedSender<Option<ServerEvent>>,
    auth: mpsc::UnboundedReceiver<Option<String>>,
}

impl ScriptedPeer {
    async fn next(&mut self) -> (usize, ClientEvent) {
        timeout(Duration::from_secs(2), self.inbound.recv())
            .await
            .expect("Should receive event within timeout")
            .expect("Peer task ended")
    }

    fn send(&self, event: ServerEvent) {
        self.outbound.send(Some(event)).unwrap();
    }

    fn close_connection(&self) {
        self.outbound.send(None).unwrap();
    }

    async fn next_auth(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.auth.recv())
            .await
            .expect("Should see a handshake within timeout")
            .expect("Peer task ended")
    }
}

/// Accept connections one after another on a free port.
async fn start_scripted_peer() -> ScriptedPeer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let (in_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, mut out_rx) = mpsc::unbounded_channel::<Option<ServerEvent>>();
    let (auth_tx, auth) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut index = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let auth_tx = auth_tx.clone();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let header = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let _ = auth_tx.send(header);
                Ok(resp)
            };
            let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                continue;
            };

            loop {
                tokio::select! {
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(event) = ClientEvent::decode(text.as_str()) {
                                let _ = in_tx.send((index, event));
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    scripted = out_rx.recv() => match scripted {
                        Some(Some(event)) => {
                            let text = event.encode().unwrap();
                            let _ = ws.send(Message::Text(text.into())).await;
                        }
                        Some(None) => {
                            let _ = ws.close(None).await;
                            break;
                        }
                        None => return,
                    }
                }
            }
            index += 1;
        }
    });

    ScriptedPeer { url, inbound, outbound, auth }
}

fn config(url: &str) -> ClientConfig {
    ClientConfig {
        server_url: url.to_string(),
        ..ClientConfig::default()
    }
}

async fn wait_for_session<F>(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>, mut pred: F)
where
    F: FnMut(&SessionUpdate) -> bool,
{
    timeout(Duration::from_secs(2), async {
        while let Some(update) = rx.recv().await {
            if pred(&update) {
                return;
            }
        }
        panic!("Session updates ended");
    })
    .await
    .expect("Expected session update within timeout");
}

#[tokio::test]
async fn test_join_snapshot_and_debounced_edit() {
    let mut peer = start_scripted_peer().await;
    let mut client = RoomClient::websocket(config(&peer.url));
    let mut session_rx = client.subscribe_session();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        client.run(cmd_rx).await;
        client
    });

    cmd_tx
        .send(Command::Join { room_id: "room-1".into(), room_name: None })
        .unwrap();
    assert_eq!(peer.next().await, (0, ClientEvent::JoinRoom("room-1".into())));

    peer.send(ServerEvent::LoadCode(CodeBuffers::new("<p>stored</p>", "", "")));
    wait_for_session(&mut session_rx, |u| matches!(u, SessionUpdate::Joined { .. })).await;

    for content in ["<h1>", "<h1>T", "<h1>Title</h1>"] {
        cmd_tx
            .send(Command::Edit { language: Language::Html, content: content.into() })
            .unwrap();
    }

    assert_eq!(
        peer.next().await,
        (
            0,
            ClientEvent::CodeChange(CodeChange {
                room_id: "room-1".into(),
                language: Language::Html,
                code: "<h1>Title</h1>".into(),
            })
        )
    );
    // Only the final content goes out
    assert!(timeout(Duration::from_millis(300), peer.inbound.recv()).await.is_err());

    cmd_tx.send(Command::Shutdown).unwrap();
    assert_eq!(peer.next().await, (0, ClientEvent::LeaveRoom("room-1".into())));

    let client = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert_eq!(client.router().listener_count(), 0);
}

#[tokio::test]
async fn test_remote_update_applied() {
    let mut peer = start_scripted_peer().await;
    let mut client = RoomClient::websocket(config(&peer.url));
    let mut session_rx = client.subscribe_session();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        client.run(cmd_rx).await;
        client
    });

    cmd_tx
        .send(Command::Join { room_id: "room-2".into(), room_name: None })
        .unwrap();
    peer.next().await;
    peer.send(ServerEvent::LoadCode(CodeBuffers::default()));
    peer.send(ServerEvent::CodeUpdate(canvas_collab::protocol::CodeUpdate {
        room_id: None,
        language: Language::Css,
        code: "body { margin: 0 }".into(),
    }));
    peer.send(ServerEvent::UsersInRoom(3));
    wait_for_session(&mut session_rx, |u| {
        *u == SessionUpdate::BufferChanged {
            language: Language::Css,
            origin: EditOrigin::Remote,
        }
    })
    .await;
    wait_for_session(&mut session_rx, |u| *u == SessionUpdate::ParticipantCount(3)).await;

    cmd_tx.send(Command::Shutdown).unwrap();
    let client = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert!(client.session().session().is_none());
    // A remote update never echoes back as a local change
    assert_eq!(peer.next().await, (0, ClientEvent::LeaveRoom("room-2".into())));
}

#[tokio::test]
async fn test_bearer_token_in_handshake() {
    let mut peer = start_scripted_peer().await;
    let mut client = RoomClient::websocket(config(&peer.url));
    client.set_credential(Some("secret-token".into())).unwrap();

    assert_eq!(peer.next_auth().await.as_deref(), Some("Bearer secret-token"));
    drop(client);
}

#[tokio::test]
async fn test_anonymous_chat_roundtrip() {
    let mut peer = start_scripted_peer().await;
    let mut client = RoomClient::websocket(config(&peer.url));
    let mut updates = client.take_update_rx().unwrap();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        client.run(cmd_rx).await;
        client
    });

    assert_eq!(peer.next_auth().await, None);
    cmd_tx
        .send(Command::Join { room_id: "room-3".into(), room_name: None })
        .unwrap();
    peer.next().await;
    peer.send(ServerEvent::LoadCode(CodeBuffers::default()));

    cmd_tx.send(Command::ClaimName("Ann".into())).unwrap();
    assert_eq!(
        peer.next().await,
        (
            0,
            ClientEvent::SetUsername(UsernameClaim {
                room_id: "room-3".into(),
                username: "Ann".into(),
            })
        )
    );
    peer.send(ServerEvent::UsernameAccepted(None));

    // Give the verdict a moment to land before sending
    tokio::time::sleep(Duration::from_millis(50)).await;
    cmd_tx.send(Command::SendChat("hi".into())).unwrap();
    assert_eq!(
        peer.next().await,
        (
            0,
            ClientEvent::SendMessage(ChatSend {
                room_id: "room-3".into(),
                message: "hi".into(),
            })
        )
    );

    peer.send(ServerEvent::ChatMessage(ChatPayload {
        username: "Ann".into(),
        message: "hi".into(),
        timestamp: 1,
        is_own: true,
    }));

    let appended = timeout(Duration::from_secs(2), async {
        loop {
            match updates.recv().await {
                Some(ClientUpdate::Chat(ChatUpdate::Appended(message))) => return message,
                Some(_) => continue,
                None => panic!("Updates ended"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(appended.author, "Ann");
    assert_eq!(appended.body, "hi");

    cmd_tx.send(Command::Shutdown).unwrap();
    let client = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert!(client.chat().transcript().is_empty());
}

#[tokio::test]
async fn test_server_close_marks_disconnected() {
    let mut peer = start_scripted_peer().await;
    let mut client = RoomClient::websocket(config(&peer.url));
    let mut state_rx = client.subscribe_state();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        client.run(cmd_rx).await;
        client
    });

    peer.next_auth().await;
    timeout(
        Duration::from_secs(2),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    peer.close_connection();
    timeout(
        Duration::from_secs(2),
        state_rx.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();

    cmd_tx.send(Command::Shutdown).unwrap();
    timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_credential_change_rejoins_on_new_channel() {
    let mut peer = start_scripted_peer().await;
    let mut client = RoomClient::websocket(config(&peer.url));
    let mut session_rx = client.subscribe_session();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        client.run(cmd_rx).await;
        client
    });

    assert_eq!(peer.next_auth().await, None);
    cmd_tx
        .send(Command::Join { room_id: "room-4".into(), room_name: None })
        .unwrap();
    assert_eq!(peer.next().await, (0, ClientEvent::JoinRoom("room-4".into())));
    peer.send(ServerEvent::LoadCode(CodeBuffers::default()));
    wait_for_session(&mut session_rx, |u| matches!(u, SessionUpdate::Joined { .. })).await;

    cmd_tx.send(Command::SetCredential(Some("tok".into()))).unwrap();
    assert_eq!(peer.next().await, (0, ClientEvent::LeaveRoom("room-4".into())));
    assert_eq!(peer.next_auth().await.as_deref(), Some("Bearer tok"));
    assert_eq!(peer.next().await, (1, ClientEvent::JoinRoom("room-4".into())));

    cmd_tx.send(Command::Shutdown).unwrap();
    timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}
