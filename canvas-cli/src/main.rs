//! Code Canvas terminal client.
//!
//! Joins a collaborative room over WebSocket and drives it from stdin,
//! one command per line (`help` lists them). Room management and display
//! names go through the HTTP service when a token is configured.
//!
//! Environment:
//! - `CANVAS_SERVER_URL` room channel endpoint (default `ws://localhost:5000`)
//! - `CANVAS_API_URL` HTTP service base URL
//! - `CANVAS_APP_URL` web app origin used for shareable links
//! - `CANVAS_TOKEN` bearer token; anonymous when unset
//! - `CANVAS_CLAIM_TIMEOUT_MS` give up on a username claim after this long
//! - `RUST_LOG` log filter

mod commands;

use std::time::Duration;

use canvas_api::{generate_room_id, room_link, ApiClient, ApiConfig, ApiError};
use canvas_collab::{
    ChatUpdate, ClientConfig, ClientUpdate, Command, IdentityOutcome, MessageKind, NoticeKind,
    RoomClient, SessionUpdate,
};
use canvas_layout::{DragHandle, LayoutConfig, LayoutEngine, Viewport};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use commands::{parse_line, Input, LayoutInput, HELP};

/// Everything read from the environment at startup.
struct Settings {
    client: ClientConfig,
    api: ApiConfig,
    token: Option<String>,
}

impl Settings {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut client = ClientConfig::default();
        if let Some(url) = var("CANVAS_SERVER_URL") {
            client.server_url = url;
        }
        if let Some(ms) = var("CANVAS_CLAIM_TIMEOUT_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => client.claim_timeout = Some(Duration::from_millis(ms)),
                Err(e) => warn!("Ignoring CANVAS_CLAIM_TIMEOUT_MS={ms}: {e}"),
            }
        }

        let mut api = ApiConfig::default().with_timeout(Duration::from_secs(10));
        if let Some(url) = var("CANVAS_API_URL") {
            api.base_url = url;
        }
        if let Some(url) = var("CANVAS_APP_URL") {
            api.app_url = url;
        }

        Self {
            client,
            api,
            token: var("CANVAS_TOKEN"),
        }
    }
}

/// Stdin side: parses lines, talks to the HTTP service and the local
/// layout, and forwards room commands to the client loop.
struct Console {
    api: ApiClient,
    layout: LayoutEngine,
    current_room: Option<String>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Console {
    fn forward(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    fn report(&self, message: impl Into<String>) {
        self.forward(Command::Notify {
            message: message.into(),
            kind: NoticeKind::Error,
        });
    }

    async fn join(&mut self, room_id: String, room_name: Option<String>) {
        let room_name = match room_name {
            Some(name) => Some(name),
            None => match self.api.room_name(&room_id).await {
                Ok(name) => name,
                Err(e) => {
                    self.report(room_name_failure(&e));
                    None
                }
            },
        };
        self.current_room = Some(room_id.clone());
        self.forward(Command::Join { room_id, room_name });
    }

    /// Returns `false` once the session should end.
    async fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Client(Command::SetCredential(token)) => {
                self.api.set_token(token.clone());
                return self.forward(Command::SetCredential(token));
            }
            Input::Client(Command::Leave) => {
                self.current_room = None;
                return self.forward(Command::Leave);
            }
            Input::Client(command) => return self.forward(command),
            Input::Join(room_id) => self.join(room_id, None).await,
            Input::CreateRoom(name) => {
                if self.api.token().is_none() {
                    self.join(generate_room_id(), name).await;
                    return true;
                }
                match self.api.create_room(name.as_deref().unwrap_or("")).await {
                    Ok(room) => self.join(room.room_id, Some(room.name)).await,
                    Err(e) => self.report(format!("Failed to create room: {e}")),
                }
            }
            Input::ListRooms => match self.api.list_rooms().await {
                Ok(rooms) if rooms.is_empty() => println!("No rooms yet"),
                Ok(rooms) => {
                    for room in rooms {
                        let visibility = if room.is_public { "public" } else { "private" };
                        println!("  {}  {}  ({visibility})", room.room_id, room.name);
                    }
                }
                Err(e) => self.report(e.to_string()),
            },
            Input::RenameRoom { room_id, name } => {
                match self.api.rename_room(&room_id, &name).await {
                    Ok(room) => {
                        if self.current_room.as_deref() == Some(room.room_id.as_str()) {
                            self.forward(Command::SetRoomName(Some(room.name)));
                        }
                    }
                    Err(e) => self.report(format!("Failed to rename room: {e}")),
                }
            }
            Input::DeleteRoom(room_id) => match self.api.delete_room(&room_id).await {
                Ok(()) => println!("Deleted {room_id}"),
                Err(e) => self.report(format!("Failed to delete room: {e}")),
            },
            Input::Link => match &self.current_room {
                Some(room_id) => match room_link(&self.api.config().app_url, room_id) {
                    Ok(link) => println!("{link}"),
                    Err(e) => self.report(e.to_string()),
                },
                None => self.report("Not in a room"),
            },
            Input::Whoami => match self.api.current_user().await {
                Ok(user) => println!("Signed in as {}", user.username),
                Err(e) => self.report(e.to_string()),
            },
            Input::Layout(input) => self.layout(input),
            Input::Help => println!("{HELP}"),
            Input::Quit => return false,
        }
        true
    }

    fn layout(&mut self, input: LayoutInput) {
        match input {
            LayoutInput::Viewport { width, height } => {
                self.layout.resize(Viewport::new(width, height));
            }
            LayoutInput::DragSplit(y) => self.drag(DragHandle::EditorSplit, 0.0, y),
            LayoutInput::DragChat(x) => self.drag(DragHandle::ChatWidth, x, 0.0),
            LayoutInput::ToggleChat => {
                let open = self.layout.toggle_chat();
                println!("Chat {}", if open { "open" } else { "closed" });
                return;
            }
            LayoutInput::Panes => {
                let panes = self.layout.panes().map(|panes| format!("{panes:#?}"));
                match panes {
                    Ok(panes) => println!("{panes}"),
                    Err(e) => self.report(e.to_string()),
                }
                return;
            }
        }
        let geometry = self.layout.geometry();
        println!(
            "Split {:.1}%, chat width {:.0}px",
            geometry.split_percent, geometry.chat_width
        );
    }

    /// A complete drag in one step: press, move, one frame, release.
    fn drag(&mut self, handle: DragHandle, x: f32, y: f32) {
        if !self.layout.pointer_down(handle) {
            self.report("Open the chat first");
            return;
        }
        self.layout.pointer_move(x, y);
        self.layout.on_frame();
        self.layout.pointer_up();
    }

    async fn run(mut self, initial_room: Option<String>) {
        if let Some(room) = initial_room {
            self.join(canvas_api::extract_room_id(&room), None).await;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin: {e}");
                    break;
                }
            };
            match parse_line(&line) {
                Ok(Some(input)) => {
                    if !self.handle(input).await {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("{e}"),
            }
        }
        self.layout.teardown();
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// The join still goes ahead without a display name.
fn room_name_failure(error: &ApiError) -> String {
    format!("Failed to load room name: {error}")
}

fn print_update(update: ClientUpdate) -> Option<(String, String)> {
    match update {
        ClientUpdate::Chat(ChatUpdate::Appended(message)) => match message.kind {
            MessageKind::User if message.is_own => println!("[you] {}", message.body),
            MessageKind::User => println!("[{}] {}", message.author, message.body),
            MessageKind::System => println!("* {}", message.body),
        },
        ClientUpdate::Chat(ChatUpdate::Identity(outcome)) => match outcome {
            IdentityOutcome::Resolved(name) => println!("You are chatting as {name}"),
            IdentityOutcome::Taken(name) => println!("Username {name} is taken, pick another"),
            IdentityOutcome::TimedOut(name) => {
                println!("No response claiming {name}, try again")
            }
        },
        ClientUpdate::Preview(document) => {
            log::debug!("Preview recomposed ({} bytes)", document.len())
        }
        ClientUpdate::Notice(notice) => {
            let tag = match notice.kind {
                NoticeKind::Success => "ok",
                NoticeKind::Error => "error",
                NoticeKind::Info => "info",
            };
            println!("({tag}) {}", notice.message);
        }
        ClientUpdate::NoticeCleared => {}
        ClientUpdate::Exported { filename, document } => return Some((filename, document)),
    }
    None
}

fn print_session(update: SessionUpdate) {
    match update {
        SessionUpdate::Joining { room_id } => println!("Joining {room_id}..."),
        SessionUpdate::Joined { room_id } => println!("Joined {room_id}"),
        SessionUpdate::BufferChanged { language, origin } => {
            log::debug!("{language:?} buffer changed ({origin:?})")
        }
        SessionUpdate::ParticipantCount(count) => println!("{count} in room"),
        SessionUpdate::RoomName(Some(name)) => println!("Room: {name}"),
        SessionUpdate::RoomName(None) => {}
        SessionUpdate::Connection(state) => println!("Connection: {state:?}"),
        SessionUpdate::Left { room_id } => println!("Left {room_id}"),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let settings = Settings::from_env();
    info!(
        "Code Canvas client: channel {}, api {}",
        settings.client.server_url, settings.api.base_url
    );

    let api = match ApiClient::new(settings.api.clone()) {
        Ok(api) => api,
        Err(e) => {
            log::error!("Failed to build HTTP client: {e}");
            return;
        }
    };
    let api = match settings.token.clone() {
        Some(token) => api.with_token(token),
        None => api,
    };

    let mut client = RoomClient::websocket(settings.client.clone());
    let mut session_rx = client.subscribe_session();
    let Some(mut update_rx) = client.take_update_rx() else {
        return;
    };

    tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            if let Some((filename, document)) = print_update(update) {
                match tokio::fs::write(&filename, document).await {
                    Ok(()) => println!("Wrote {filename}"),
                    Err(e) => println!("Could not write {filename}: {e}"),
                }
            }
        }
    });
    tokio::spawn(async move {
        while let Some(update) = session_rx.recv().await {
            print_session(update);
        }
    });

    if settings.token.is_some() {
        if let Err(e) = client.set_credential(settings.token.clone()) {
            warn!("Could not apply CANVAS_TOKEN: {e}");
        }
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let console = Console {
        api,
        layout: LayoutEngine::new(LayoutConfig::default(), Viewport::new(1280.0, 800.0)),
        current_room: None,
        commands: command_tx,
    };
    tokio::spawn(console.run(std::env::args().nth(1)));

    println!("Type `help` for commands");
    client.run(command_rx).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> (Console, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let api = ApiClient::new(ApiConfig::default().with_base_url("http://127.0.0.1:9"))
            .unwrap()
            .with_token("t");
        let console = Console {
            api,
            layout: LayoutEngine::new(LayoutConfig::default(), Viewport::new(1280.0, 800.0)),
            current_room: None,
            commands: tx,
        };
        (console, rx)
    }

    #[test]
    fn test_room_name_failure_message() {
        assert_eq!(
            room_name_failure(&ApiError::MissingToken),
            format!("Failed to load room name: {}", ApiError::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_join_reports_room_name_failure() {
        let (mut console, mut rx) = console();
        console.join("abc".into(), None).await;

        match rx.recv().await.unwrap() {
            Command::Notify { message, kind } => {
                assert_eq!(kind, NoticeKind::Error);
                assert!(message.starts_with("Failed to load room name: "));
            }
            other => panic!("Expected notice, got {other:?}"),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            Command::Join {
                room_id: "abc".into(),
                room_name: None
            }
        );
        assert_eq!(console.current_room.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_join_with_known_name_skips_lookup() {
        let (mut console, mut rx) = console();
        console.join("abc".into(), Some("Demo".into())).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            Command::Join {
                room_id: "abc".into(),
                room_name: Some("Demo".into())
            }
        );
    }
}
