//! Line-oriented input parsing for the terminal client.

use canvas_api::extract_room_id;
use canvas_collab::Command;
use canvas_core::Language;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutInput {
    Viewport { width: f32, height: f32 },
    DragSplit(f32),
    DragChat(f32),
    ToggleChat,
    Panes,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Forwarded to the room client as-is
    Client(Command),
    /// Join, looking up the display name first
    Join(String),
    CreateRoom(Option<String>),
    ListRooms,
    RenameRoom { room_id: String, name: String },
    DeleteRoom(String),
    Link,
    Whoami,
    Layout(LayoutInput),
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Unknown language `{0}` (html, css or js)")]
    Language(String),
}

pub const HELP: &str = "\
join <room id | link>      enter a room
new [name]                 create a room and enter it
leave                      leave the current room
edit <html|css|js> <text>  replace a buffer (\\n for newlines)
clear                      empty all three buffers
name <username>            claim a chat name
say <message>              send a chat message
export                     write the standalone HTML file
download <html|css|js>     write one buffer as code.<ext>
login <token> | logout     change credentials
rooms | rename <id> <name> | delete <id>
link | whoami
viewport <w> <h> | split <y> | chatwidth <x> | chat | panes
help | quit";

fn number(value: Option<&str>, usage: &'static str) -> Result<f32, ParseError> {
    value
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .ok_or(ParseError::Usage(usage))
}

fn required<'a>(value: &'a str, usage: &'static str) -> Result<&'a str, ParseError> {
    match value.trim() {
        "" => Err(ParseError::Usage(usage)),
        v => Ok(v),
    }
}

/// Parse one line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Input>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let input = match verb {
        "join" => Input::Join(extract_room_id(required(rest, "join <room id | link>")?)),
        "new" => Input::CreateRoom(Some(rest.to_string()).filter(|r| !r.is_empty())),
        "leave" => Input::Client(Command::Leave),
        "edit" => {
            let (lang, text) = rest.split_once(' ').unwrap_or((rest, ""));
            if lang.is_empty() {
                return Err(ParseError::Usage("edit <html|css|js> <text>"));
            }
            let language: Language = lang
                .parse()
                .map_err(|_| ParseError::Language(lang.to_string()))?;
            Input::Client(Command::Edit {
                language,
                content: text.replace("\\n", "\n"),
            })
        }
        "clear" => Input::Client(Command::ClearCode),
        "name" => Input::Client(Command::ClaimName(
            required(rest, "name <username>")?.to_string(),
        )),
        "say" => Input::Client(Command::SendChat(required(rest, "say <message>")?.to_string())),
        "export" => Input::Client(Command::Export),
        "download" => {
            let lang = required(rest, "download <html|css|js>")?;
            let language: Language = lang
                .parse()
                .map_err(|_| ParseError::Language(lang.to_string()))?;
            Input::Client(Command::Download(language))
        }
        "login" => Input::Client(Command::SetCredential(Some(
            required(rest, "login <token>")?.to_string(),
        ))),
        "logout" => Input::Client(Command::SetCredential(None)),
        "rooms" => Input::ListRooms,
        "rename" => {
            let usage = "rename <id> <name>";
            let (id, name) = rest.split_once(' ').ok_or(ParseError::Usage(usage))?;
            Input::RenameRoom {
                room_id: id.to_string(),
                name: required(name, usage)?.to_string(),
            }
        }
        "delete" => Input::DeleteRoom(required(rest, "delete <id>")?.to_string()),
        "link" => Input::Link,
        "whoami" => Input::Whoami,
        "viewport" => {
            let usage = "viewport <width> <height>";
            let mut parts = rest.split_whitespace();
            Input::Layout(LayoutInput::Viewport {
                width: number(parts.next(), usage)?,
                height: number(parts.next(), usage)?,
            })
        }
        "split" => Input::Layout(LayoutInput::DragSplit(number(Some(rest), "split <y>")?)),
        "chatwidth" => Input::Layout(LayoutInput::DragChat(number(Some(rest), "chatwidth <x>")?)),
        "chat" => Input::Layout(LayoutInput::ToggleChat),
        "panes" => Input::Layout(LayoutInput::Panes),
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}
