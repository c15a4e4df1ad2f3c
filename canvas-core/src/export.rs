//! Standalone HTML export of a room's buffers.

use crate::{CodeBuffers, Language};

pub const DEFAULT_EXPORT_FILENAME: &str = "code-canvas-export.html";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Cannot export empty code. Please write some code first.")]
    EmptyCode,
    #[error("Cannot download empty {} file", .0.display_name())]
    EmptyBuffer(Language),
}

/// A single buffer saved as its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub contents: String,
}

impl Language {
    /// File extension used when a buffer is downloaded on its own.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Language::Html => "text/html",
            Language::Css => "text/css",
            Language::Js => "text/javascript",
        }
    }
}

/// Save one buffer as `code.<ext>`, contents untouched.
pub fn export_buffer(language: Language, buffers: &CodeBuffers) -> Result<BufferFile, ExportError> {
    let contents = buffers.get(language);
    if contents.trim().is_empty() {
        return Err(ExportError::EmptyBuffer(language));
    }
    Ok(BufferFile {
        filename: format!("code.{}", language.extension()),
        mime_type: language.mime_type(),
        contents: contents.to_string(),
    })
}

/// Indent every line of `text` after the first by `prefix`.
fn indent_continuation(text: &str, prefix: &str) -> String {
    text.lines().collect::<Vec<_>>().join(&format!("\n{prefix}"))
}

/// Build a standalone HTML document from the buffers.
///
/// Blank buffers are omitted; all three blank is rejected.
pub fn export_document(buffers: &CodeBuffers) -> Result<String, ExportError> {
    if buffers.is_blank() {
        return Err(ExportError::EmptyCode);
    }

    let html = buffers.html.trim();
    let css = buffers.css.trim();
    let js = buffers.js.trim();

    let style = if css.is_empty() {
        String::new()
    } else {
        format!("<style>\n    {}\n  </style>", indent_continuation(css, "    "))
    };
    let body = indent_continuation(html, "  ");
    let script = if js.is_empty() {
        String::new()
    } else {
        format!("<script>\n    {}\n  </script>", indent_continuation(js, "    "))
    };

    Ok(format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
  <meta charset=\"UTF-8\">
  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
  <title>Code Canvas Export</title>
  {style}
</head>
<body>
  {body}
  {script}
</body>
</html>"
    ))
}
