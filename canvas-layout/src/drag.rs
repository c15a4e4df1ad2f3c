//! Pointer drag tracking with per-frame coalescing.
//!
//! ```text
//!          pointer_down              pointer_up / release
//!   Idle ───────────────► Dragging ─────────────────────► Idle
//!                           │  ▲
//!              pointer_move │  │ take_frame (latest sample only)
//!                           ▼  │
//!                        [pending]
//! ```
//!
//! Moves between two frames overwrite each other; only the most recent
//! sample is ever applied.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

#[derive(Debug, Clone, Default)]
pub struct DragTracker {
    state: DragState,
    pending: Option<f32>,
    dropped: u64,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking. Returns `false` if already dragging.
    pub fn begin(&mut self) -> bool {
        if self.state == DragState::Dragging {
            return false;
        }
        self.state = DragState::Dragging;
        self.pending = None;
        true
    }

    /// Record a pointer coordinate. Ignored while idle or non-finite.
    #[inline]
    pub fn sample(&mut self, coordinate: f32) -> bool {
        if self.state != DragState::Dragging || !coordinate.is_finite() {
            return false;
        }
        if self.pending.replace(coordinate).is_some() {
            self.dropped += 1;
        }
        true
    }

    /// Take the latest sample recorded since the previous frame.
    #[inline]
    pub fn take_frame(&mut self) -> Option<f32> {
        self.pending.take()
    }

    /// Stop tracking and discard any sample not yet applied.
    pub fn release(&mut self) -> bool {
        self.pending = None;
        std::mem::take(&mut self.state) == DragState::Dragging
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Samples superseded before a frame applied them.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped
    }
}
