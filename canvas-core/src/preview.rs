//! Preview document composition.
//!
//! The preview is rebuilt once the buffers settle: every change re-arms a
//! 250ms window and only the last one produces a new document.

use std::time::{Duration, Instant};

use crate::timer::Debounce;
use crate::CodeBuffers;

/// Default settle window before the preview is recomposed.
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(250);

/// Combine the three buffers into the document handed to the preview frame.
pub fn compose_preview(buffers: &CodeBuffers) -> String {
    format!(
        "<html>\n  <body>{}</body>\n  <style>{}</style>\n  <script>{}</script>\n</html>\n",
        buffers.html, buffers.css, buffers.js
    )
}

/// Debounced preview builder.
#[derive(Debug, Clone)]
pub struct PreviewScheduler {
    debounce: Debounce,
    document: String,
    revision: u64,
}

impl PreviewScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            debounce: Debounce::new(window),
            document: compose_preview(&CodeBuffers::default()),
            revision: 0,
        }
    }

    /// Note that a buffer changed.
    pub fn invalidate(&mut self, now: Instant) {
        self.debounce.schedule(now);
    }

    /// Recompose if the settle window has elapsed.
    ///
    /// Returns the new document when one was produced.
    pub fn poll(&mut self, now: Instant, buffers: &CodeBuffers) -> Option<&str> {
        if !self.debounce.fire(now) {
            return None;
        }
        self.document = compose_preview(buffers);
        self.revision += 1;
        log::debug!(
            "Preview recomposed (revision {}, {} bytes)",
            self.revision,
            self.document.len()
        );
        Some(&self.document)
    }

    /// Drop a pending recomposition.
    pub fn cancel(&mut self) -> bool {
        self.debounce.cancel()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// The most recently composed document.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Number of documents composed so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for PreviewScheduler {
    fn default() -> Self {
        Self::new(PREVIEW_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_preview_layout() {
        let doc = compose_preview(&CodeBuffers::new("<h1>Hi</h1>", "h1{color:red}", "1+1"));
        assert!(doc.contains("<body><h1>Hi</h1></body>"));
        assert!(doc.contains("<style>h1{color:red}</style>"));
        assert!(doc.contains("<script>1+1</script>"));
    }

    #[test]
    fn test_preview_waits_for_settle_window() {
        let t0 = Instant::now();
        let buffers = CodeBuffers::new("<p>x</p>", "", "");
        let mut preview = PreviewScheduler::default();

        preview.invalidate(t0);
        assert!(preview.poll(t0 + Duration::from_millis(100), &buffers).is_none());
        preview.invalidate(t0 + Duration::from_millis(200));
        // First window elapsed but was superseded
        assert!(preview.poll(t0 + Duration::from_millis(300), &buffers).is_none());

        let doc = preview.poll(t0 + Duration::from_millis(450), &buffers);
        assert!(doc.unwrap().contains("<p>x</p>"));
        assert_eq!(preview.revision(), 1);
        assert!(preview.next_deadline().is_none());
    }

    #[test]
    fn test_preview_cancel() {
        let t0 = Instant::now();
        let mut preview = PreviewScheduler::default();
        preview.invalidate(t0);
        assert!(preview.cancel());
        assert!(preview.poll(t0 + Duration::from_secs(1), &CodeBuffers::default()).is_none());
        assert_eq!(preview.revision(), 0);
    }
}
