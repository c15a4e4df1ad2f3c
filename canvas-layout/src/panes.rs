//! Pane rectangles for the editor page, resolved with Taffy flexbox.
//!
//! ```text
//! ┌──────────────────────── header (53px) ───────────────────────┐
//! ├──────────────────────────────────────────────┬───────────────┤
//! │ editors            (split % of main height)  │               │
//! ├════════════════════ resize handle ═══════════┤     chat      │
//! │ output label                                 │  (chat width) │
//! │ output frame                   (remainder)   │               │
//! └──────────────────────────────────────────────┴───────────────┘
//! ```

use taffy::prelude::*;
use taffy::{Layout, TaffyError};

use crate::engine::{LayoutConfig, LayoutGeometry, Viewport};
use crate::LayoutError;

/// Thickness of the editor/output resize handle.
pub const HANDLE_THICKNESS: f32 = 6.0;

/// Height of the "Output" label bar above the preview frame.
pub const OUTPUT_LABEL_HEIGHT: f32 = 32.0;

// ───────────────────────────────────────────────────────────────────
// Rect
// ───────────────────────────────────────────────────────────────────

/// Absolute rectangle in viewport pixels.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline(always)]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Point-in-rect test, edges inclusive.
    #[inline(always)]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Resolved rectangles of every pane.
#[derive(Clone, Debug, PartialEq)]
pub struct PaneRects {
    pub header: Rect,
    pub editors: Rect,
    pub handle: Rect,
    pub output_label: Rect,
    pub output: Rect,
    /// `None` while the chat sidebar is closed
    pub chat: Option<Rect>,
}

// ───────────────────────────────────────────────────────────────────
// Resolution
// ───────────────────────────────────────────────────────────────────

fn fixed_height(height: f32) -> Style {
    Style {
        size: Size {
            width: Dimension::auto(),
            height: Dimension::length(height),
        },
        flex_shrink: 0.0,
        ..Style::default()
    }
}

fn grow(direction: FlexDirection) -> Style {
    Style {
        display: Display::Flex,
        flex_direction: direction,
        flex_grow: 1.0,
        flex_basis: Dimension::length(0.0),
        ..Style::default()
    }
}

fn absolute(layout: &Layout, origin: (f32, f32)) -> Rect {
    Rect::new(
        origin.0 + layout.location.x,
        origin.1 + layout.location.y,
        layout.size.width,
        layout.size.height,
    )
}

/// Lay out the page for `viewport` with the given split geometry.
pub fn resolve_panes(
    viewport: Viewport,
    geometry: &LayoutGeometry,
    chat_open: bool,
    config: &LayoutConfig,
) -> Result<PaneRects, LayoutError> {
    if !viewport.is_usable() {
        return Err(LayoutError::DegenerateViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    let mut taffy: TaffyTree<()> = TaffyTree::new();

    let header = taffy.new_leaf(fixed_height(config.header_height))?;

    let main_height = (viewport.height - config.header_height).max(0.0);
    let editors = taffy.new_leaf(Style {
        flex_basis: Dimension::length(main_height * geometry.split_percent / 100.0),
        flex_shrink: 1.0,
        ..Style::default()
    })?;
    let handle = taffy.new_leaf(fixed_height(HANDLE_THICKNESS))?;
    let output_label = taffy.new_leaf(fixed_height(OUTPUT_LABEL_HEIGHT))?;
    let output = taffy.new_leaf(grow(FlexDirection::Column))?;
    let output_section =
        taffy.new_with_children(grow(FlexDirection::Column), &[output_label, output])?;
    let main = taffy.new_with_children(
        grow(FlexDirection::Column),
        &[editors, handle, output_section],
    )?;

    let chat = if chat_open {
        Some(taffy.new_leaf(Style {
            size: Size {
                width: Dimension::length(geometry.chat_width),
                height: Dimension::auto(),
            },
            flex_shrink: 0.0,
            ..Style::default()
        })?)
    } else {
        None
    };

    let mut body_children = vec![main];
    body_children.extend(chat);
    let body = taffy.new_with_children(grow(FlexDirection::Row), &body_children)?;

    let root = taffy.new_with_children(
        Style {
            display: Display::Flex,
            flex_direction: FlexDirection::Column,
            size: Size {
                width: Dimension::length(viewport.width),
                height: Dimension::length(viewport.height),
            },
            ..Style::default()
        },
        &[header, body],
    )?;

    taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(viewport.width),
            height: AvailableSpace::Definite(viewport.height),
        },
    )?;

    let layout_of = |node: NodeId| -> Result<Layout, TaffyError> { taffy.layout(node).copied() };

    let root_rect = absolute(&layout_of(root)?, (0.0, 0.0));
    let body_rect = absolute(&layout_of(body)?, (root_rect.x, root_rect.y));
    let main_rect = absolute(&layout_of(main)?, (body_rect.x, body_rect.y));
    let section_rect = absolute(&layout_of(output_section)?, (main_rect.x, main_rect.y));

    let rects = PaneRects {
        header: absolute(&layout_of(header)?, (root_rect.x, root_rect.y)),
        editors: absolute(&layout_of(editors)?, (main_rect.x, main_rect.y)),
        handle: absolute(&layout_of(handle)?, (main_rect.x, main_rect.y)),
        output_label: absolute(&layout_of(output_label)?, (section_rect.x, section_rect.y)),
        output: absolute(&layout_of(output)?, (section_rect.x, section_rect.y)),
        chat: match chat {
            Some(node) => Some(absolute(&layout_of(node)?, (body_rect.x, body_rect.y))),
            None => None,
        },
    };
    log::trace!("Resolved panes: {rects:?}");
    Ok(rects)
}
