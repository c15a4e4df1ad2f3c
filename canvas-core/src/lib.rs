//! # canvas-core: shared model for Code Canvas rooms
//!
//! A room holds three text buffers that are edited together and rendered as
//! one page:
//!
//! ```text
//! ┌────────┬────────┬────────┐
//! │  HTML  │  CSS   │   JS   │   CodeBuffers (one String each)
//! └───┬────┴───┬────┴───┬────┘
//!     └────────┼────────┘
//!              ▼
//!      compose_preview()  ──►  preview frame (external renderer)
//!      export_document()  ──►  standalone .html file
//!      export_buffer()    ──►  code.html / code.css / code.js
//! ```
//!
//! ## Modules
//!
//! - [`timer`]: cancellable debounce timers driven by explicit `Instant`s
//! - [`preview`]: preview document composition with a settle window
//! - [`export`]: standalone HTML export and single-buffer downloads

pub mod export;
pub mod preview;
pub mod timer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use export::{export_buffer, export_document, BufferFile, ExportError, DEFAULT_EXPORT_FILENAME};
pub use preview::{compose_preview, PreviewScheduler};
pub use timer::{Debounce, DebounceSet};

/// One of the three buffers of a room.
///
/// Serialized as the lowercase wire name (`"html"`, `"css"`, `"js"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Page structure
    Html,
    /// Styling
    Css,
    /// Behavior
    Js,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Html, Language::Css, Language::Js];

    /// Wire name used in channel payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Js => "js",
        }
    }

    /// Label shown above the editor pane.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Js => "JS",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown buffer name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            "js" | "javascript" => Ok(Language::Js),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

/// The three buffers of a room.
///
/// Also the shape of the snapshot payload delivered on join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBuffers {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

impl CodeBuffers {
    pub fn new(
        html: impl Into<String>,
        css: impl Into<String>,
        js: impl Into<String>,
    ) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    /// Content of one buffer.
    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Html => &self.html,
            Language::Css => &self.css,
            Language::Js => &self.js,
        }
    }

    /// Replace a whole buffer. Returns `true` if the content changed.
    pub fn set(&mut self, language: Language, content: impl Into<String>) -> bool {
        let content = content.into();
        let slot = match language {
            Language::Html => &mut self.html,
            Language::Css => &mut self.css,
            Language::Js => &mut self.js,
        };
        if *slot == content {
            return false;
        }
        *slot = content;
        true
    }

    /// Whether every buffer is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        Language::ALL.iter().all(|&l| self.get(l).trim().is_empty())
    }

    /// Iterate `(language, content)` pairs in html, css, js order.
    pub fn iter(&self) -> impl Iterator<Item = (Language, &str)> {
        Language::ALL.into_iter().map(move |l| (l, self.get(l)))
    }

    /// Total size of all buffers in bytes.
    pub fn total_len(&self) -> usize {
        self.html.len() + self.css.len() + self.js.len()
    }
}
