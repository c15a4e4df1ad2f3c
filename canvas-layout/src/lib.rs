//! # canvas-layout: Resizable editor page geometry
//!
//! Two drag handles resize the page: the boundary between the code
//! editors and the output frame, and the leading edge of the chat
//! sidebar. Pointer moves are sampled and applied at most once per frame.
//!
//! ```text
//! pointer_down ──► DragTracker ──sample──► on_frame ──clamp──► LayoutGeometry
//!                                                                   │
//!                                            Taffy flexbox ◄────────┘
//!                                                 │
//!                                                 ▼
//!                                             PaneRects
//! ```

pub mod drag;
pub mod engine;
pub mod panes;

pub use drag::{DragState, DragTracker};
pub use engine::{
    chat_width_from_pointer, split_from_pointer, DragHandle, LayoutConfig, LayoutEngine,
    LayoutError, LayoutGeometry, Viewport,
};
pub use panes::{resolve_panes, PaneRects, Rect};
