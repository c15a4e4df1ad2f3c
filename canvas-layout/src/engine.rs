use taffy::TaffyError;
use thiserror::Error;

use crate::drag::DragTracker;
use crate::panes::{resolve_panes, PaneRects, Rect};

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Taffy error: {0}")]
    Taffy(#[from] TaffyError),
    #[error("Viewport too small to lay out: {width}x{height}")]
    DegenerateViewport { width: f32, height: f32 },
}

/// Width of the grab strip on the chat sidebar's leading edge.
pub const CHAT_HANDLE_WIDTH: f32 = 6.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub min_split_percent: f32,
    pub max_split_percent: f32,
    /// Chat width bounds as fractions of the viewport width
    pub min_chat_fraction: f32,
    pub max_chat_fraction: f32,
    pub header_height: f32,
    pub default_split_percent: f32,
    pub default_chat_width: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_split_percent: 5.0,
            max_split_percent: 95.0,
            min_chat_fraction: 0.10,
            max_chat_fraction: 0.35,
            header_height: 53.0,
            default_split_percent: 50.0,
            default_chat_width: 320.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Current split positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutGeometry {
    /// Editor row height as a percentage of the area below the header
    pub split_percent: f32,
    /// Chat sidebar width in pixels
    pub chat_width: f32,
}

impl Default for LayoutGeometry {
    fn default() -> Self {
        let config = LayoutConfig::default();
        Self {
            split_percent: config.default_split_percent,
            chat_width: config.default_chat_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragHandle {
    /// Boundary between the editors and the output frame
    EditorSplit,
    /// Leading edge of the chat sidebar
    ChatWidth,
}

// ---------------------------------------------------------------
// Pure clamping
// ---------------------------------------------------------------

/// Split percentage for a pointer at `y`, or `None` for an empty container.
#[inline]
pub fn split_from_pointer(
    y: f32,
    container_top: f32,
    container_height: f32,
    config: &LayoutConfig,
) -> Option<f32> {
    if !(container_height > 0.0) || !y.is_finite() {
        return None;
    }
    let percent = (y - container_top) / container_height * 100.0;
    Some(percent.clamp(config.min_split_percent, config.max_split_percent))
}

/// Chat width for a pointer at `x`, measured from the viewport's right edge.
#[inline]
pub fn chat_width_from_pointer(x: f32, viewport_width: f32, config: &LayoutConfig) -> Option<f32> {
    if !(viewport_width > 0.0) || !x.is_finite() {
        return None;
    }
    Some(clamp_chat_width(viewport_width - x, viewport_width, config))
}

#[inline]
fn clamp_chat_width(width: f32, viewport_width: f32, config: &LayoutConfig) -> f32 {
    let min = viewport_width * config.min_chat_fraction;
    let max = viewport_width * config.max_chat_fraction;
    width.clamp(min, max)
}

// ---------------------------------------------------------------
// Engine
// ---------------------------------------------------------------

/// Resizable editor page: two drag trackers feeding one geometry.
///
/// Pointer input is only sampled; geometry changes once per frame in
/// [`on_frame`](Self::on_frame).
pub struct LayoutEngine {
    config: LayoutConfig,
    viewport: Viewport,
    geometry: LayoutGeometry,
    chat_open: bool,

    split: DragTracker,
    chat: DragTracker,

    /// Cached pane rectangles, `None` when geometry changed since last resolve
    panes: Option<PaneRects>,
}

impl LayoutEngine {
    /// The default chat width is clamped against `viewport` when it is
    /// usable. A degenerate starting viewport leaves it unclamped until the
    /// first usable one arrives through [`LayoutEngine::resize`].
    pub fn new(config: LayoutConfig, viewport: Viewport) -> Self {
        let mut geometry = LayoutGeometry {
            split_percent: config
                .default_split_percent
                .clamp(config.min_split_percent, config.max_split_percent),
            chat_width: config.default_chat_width,
        };
        if viewport.is_usable() {
            geometry.chat_width = clamp_chat_width(geometry.chat_width, viewport.width, &config);
        }
        Self {
            config,
            viewport,
            geometry,
            chat_open: false,
            split: DragTracker::new(),
            chat: DragTracker::new(),
            panes: None,
        }
    }

    fn tracker(&mut self, handle: DragHandle) -> &mut DragTracker {
        match handle {
            DragHandle::EditorSplit => &mut self.split,
            DragHandle::ChatWidth => &mut self.chat,
        }
    }

    /// Start dragging `handle`. Any other drag in progress ends first.
    pub fn pointer_down(&mut self, handle: DragHandle) -> bool {
        let other = match handle {
            DragHandle::EditorSplit => DragHandle::ChatWidth,
            DragHandle::ChatWidth => DragHandle::EditorSplit,
        };
        self.tracker(other).release();
        if handle == DragHandle::ChatWidth && !self.chat_open {
            return false;
        }
        let started = self.tracker(handle).begin();
        if started {
            log::debug!("Drag started on {handle:?}");
        }
        started
    }

    /// Record a pointer position; applied on the next frame.
    #[inline]
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.split.sample(y);
        self.chat.sample(x);
    }

    /// Apply the latest sample of each active drag.
    ///
    /// Returns the new geometry when it changed.
    pub fn on_frame(&mut self) -> Option<LayoutGeometry> {
        let mut next = self.geometry;

        if let Some(y) = self.split.take_frame() {
            let top = self.config.header_height;
            let height = self.viewport.height - top;
            if let Some(percent) = split_from_pointer(y, top, height, &self.config) {
                next.split_percent = percent;
            }
        }
        if let Some(x) = self.chat.take_frame() {
            if let Some(width) = chat_width_from_pointer(x, self.viewport.width, &self.config) {
                next.chat_width = width;
            }
        }

        if next == self.geometry {
            return None;
        }
        self.geometry = next;
        self.panes = None;
        Some(next)
    }

    /// End any drag. Samples not yet applied are discarded.
    pub fn pointer_up(&mut self) -> bool {
        let split = self.split.release();
        let chat = self.chat.release();
        if split || chat {
            log::debug!("Drag ended");
        }
        split || chat
    }

    /// Release tracking when the page goes away.
    pub fn teardown(&mut self) {
        self.pointer_up();
        self.panes = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.split.is_dragging() || self.chat.is_dragging()
    }

    pub fn is_dragging(&self, handle: DragHandle) -> bool {
        match handle {
            DragHandle::EditorSplit => self.split.is_dragging(),
            DragHandle::ChatWidth => self.chat.is_dragging(),
        }
    }

    /// Change the viewport and re-clamp the chat width to the new bounds.
    pub fn resize(&mut self, viewport: Viewport) -> Option<LayoutGeometry> {
        self.viewport = viewport;
        self.panes = None;
        if !viewport.is_usable() {
            log::warn!(
                "Ignoring degenerate viewport {}x{}",
                viewport.width,
                viewport.height
            );
            return None;
        }
        let width = clamp_chat_width(self.geometry.chat_width, viewport.width, &self.config);
        if width == self.geometry.chat_width {
            return None;
        }
        self.geometry.chat_width = width;
        Some(self.geometry)
    }

    pub fn set_chat_open(&mut self, open: bool) {
        if self.chat_open == open {
            return;
        }
        self.chat_open = open;
        self.panes = None;
        if !open {
            self.chat.release();
        }
    }

    pub fn toggle_chat(&mut self) -> bool {
        self.set_chat_open(!self.chat_open);
        self.chat_open
    }

    /// Pane rectangles for the current geometry, resolved lazily.
    pub fn panes(&mut self) -> Result<&PaneRects, LayoutError> {
        let panes = match self.panes.take() {
            Some(panes) => panes,
            None => resolve_panes(self.viewport, &self.geometry, self.chat_open, &self.config)?,
        };
        Ok(&*self.panes.insert(panes))
    }

    /// Which drag handle, if any, lies under the pointer.
    pub fn hit_test(&mut self, x: f32, y: f32) -> Result<Option<DragHandle>, LayoutError> {
        let panes = self.panes()?;
        if panes.handle.contains(x, y) {
            return Ok(Some(DragHandle::EditorSplit));
        }
        if let Some(chat) = panes.chat {
            let strip = Rect::new(chat.x, chat.y, CHAT_HANDLE_WIDTH, chat.height);
            if strip.contains(x, y) {
                return Ok(Some(DragHandle::ChatWidth));
            }
        }
        Ok(None)
    }

    pub fn geometry(&self) -> LayoutGeometry {
        self.geometry
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn is_chat_open(&self) -> bool {
        self.chat_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LayoutEngine {
        // 800px below the header
        LayoutEngine::new(LayoutConfig::default(), Viewport::new(1000.0, 853.0))
    }

    #[test]
    fn test_defaults() {
        let engine = engine();
        assert_eq!(engine.geometry().split_percent, 50.0);
        assert_eq!(engine.geometry().chat_width, 320.0);
        assert!(!engine.is_chat_open());
        assert!(!engine.is_tracking());
    }

    #[test]
    fn test_default_chat_width_clamped_to_small_viewport() {
        let engine = LayoutEngine::new(LayoutConfig::default(), Viewport::new(600.0, 400.0));
        assert_eq!(engine.geometry().chat_width, 210.0);
    }

    #[test]
    fn test_split_drag_applies_latest_sample_per_frame() {
        let mut engine = engine();
        assert!(engine.pointer_down(DragHandle::EditorSplit));
        engine.pointer_move(0.0, 53.0 + 100.0);
        engine.pointer_move(0.0, 53.0 + 200.0);
        let geometry = engine.on_frame().unwrap();
        assert!((geometry.split_percent - 25.0).abs() < 1e-4);
        assert!(engine.on_frame().is_none());
    }

    #[test]
    fn test_split_clamped() {
        let mut engine = engine();
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_move(0.0, -500.0);
        assert_eq!(engine.on_frame().unwrap().split_percent, 5.0);
        engine.pointer_move(0.0, 10_000.0);
        assert_eq!(engine.on_frame().unwrap().split_percent, 95.0);
    }

    #[test]
    fn test_chat_drag_requires_open_sidebar() {
        let mut engine = engine();
        assert!(!engine.pointer_down(DragHandle::ChatWidth));
        engine.set_chat_open(true);
        assert!(engine.pointer_down(DragHandle::ChatWidth));
        engine.pointer_move(750.0, 0.0);
        assert_eq!(engine.on_frame().unwrap().chat_width, 250.0);
    }

    #[test]
    fn test_chat_width_clamped() {
        let mut engine = engine();
        engine.set_chat_open(true);
        engine.pointer_down(DragHandle::ChatWidth);
        engine.pointer_move(0.0, 0.0);
        assert_eq!(engine.on_frame().unwrap().chat_width, 350.0);
        engine.pointer_move(999.0, 0.0);
        assert_eq!(engine.on_frame().unwrap().chat_width, 100.0);
    }

    #[test]
    fn test_pointer_down_ends_other_drag() {
        let mut engine = engine();
        engine.set_chat_open(true);
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_down(DragHandle::ChatWidth);
        assert!(!engine.is_dragging(DragHandle::EditorSplit));
        assert!(engine.is_dragging(DragHandle::ChatWidth));

        engine.pointer_move(700.0, 53.0);
        let geometry = engine.on_frame().unwrap();
        assert_eq!(geometry.split_percent, 50.0);
        assert_eq!(geometry.chat_width, 300.0);
    }

    #[test]
    fn test_pointer_up_discards_pending() {
        let mut engine = engine();
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_move(0.0, 100.0);
        assert!(engine.pointer_up());
        assert!(!engine.is_tracking());
        assert!(engine.on_frame().is_none());
        assert_eq!(engine.geometry().split_percent, 50.0);
    }

    #[test]
    fn test_moves_after_release_ignored() {
        let mut engine = engine();
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_up();
        engine.pointer_move(0.0, 100.0);
        assert!(engine.on_frame().is_none());
    }

    #[test]
    fn test_teardown_releases_tracking() {
        let mut engine = engine();
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_move(0.0, 300.0);
        engine.teardown();
        assert!(!engine.is_tracking());
        assert!(engine.on_frame().is_none());
    }

    #[test]
    fn test_degenerate_container_ignores_samples() {
        let mut engine = LayoutEngine::new(LayoutConfig::default(), Viewport::new(1000.0, 53.0));
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_move(0.0, 40.0);
        assert!(engine.on_frame().is_none());
        assert!(split_from_pointer(10.0, 0.0, 0.0, &LayoutConfig::default()).is_none());
        assert!(chat_width_from_pointer(10.0, 0.0, &LayoutConfig::default()).is_none());
    }

    #[test]
    fn test_resize_reclamps_chat_width() {
        let mut engine = engine();
        let geometry = engine.resize(Viewport::new(500.0, 853.0)).unwrap();
        assert_eq!(geometry.chat_width, 175.0);
        assert!(engine.resize(Viewport::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_degenerate_start_clamps_on_first_usable_viewport() {
        let mut engine = LayoutEngine::new(LayoutConfig::default(), Viewport::new(0.0, 0.0));
        assert_eq!(engine.geometry().chat_width, 320.0);

        let geometry = engine.resize(Viewport::new(600.0, 800.0)).unwrap();
        assert!((geometry.chat_width - 210.0).abs() < 1e-3);
        assert_eq!(engine.geometry(), geometry);
    }

    #[test]
    fn test_geometry_within_bounds_for_any_pointer() {
        let config = LayoutConfig::default();
        let mut engine = LayoutEngine::new(config.clone(), Viewport::new(1280.0, 720.0));
        engine.set_chat_open(true);
        let coords = [
            f32::MIN,
            -1e9,
            -53.0,
            0.0,
            0.5,
            53.0,
            360.0,
            719.9,
            1280.0,
            1e9,
            f32::MAX,
        ];
        for handle in [DragHandle::EditorSplit, DragHandle::ChatWidth] {
            engine.pointer_down(handle);
            for &x in &coords {
                for &y in &coords {
                    engine.pointer_move(x, y);
                    engine.on_frame();
                    let g = engine.geometry();
                    assert!((5.0..=95.0).contains(&g.split_percent), "{g:?}");
                    assert!(g.chat_width >= 1280.0 * 0.10 && g.chat_width <= 1280.0 * 0.35);
                }
            }
            engine.pointer_up();
        }
    }

    #[test]
    fn test_hit_test_finds_handles() {
        let mut engine = engine();
        engine.set_chat_open(true);
        let panes = engine.panes().unwrap().clone();
        let handle_y = panes.handle.y + panes.handle.height / 2.0;
        assert_eq!(
            engine.hit_test(10.0, handle_y).unwrap(),
            Some(DragHandle::EditorSplit)
        );
        let chat = panes.chat.unwrap();
        assert_eq!(
            engine.hit_test(chat.x + 1.0, chat.y + 10.0).unwrap(),
            Some(DragHandle::ChatWidth)
        );
        assert_eq!(engine.hit_test(chat.x + 100.0, chat.y + 10.0).unwrap(), None);
    }

    #[test]
    fn test_panes_follow_geometry() {
        let mut engine = engine();
        let before = engine.panes().unwrap().editors.height;
        engine.pointer_down(DragHandle::EditorSplit);
        engine.pointer_move(0.0, 53.0 + 200.0);
        engine.on_frame();
        let after = engine.panes().unwrap().editors.height;
        assert!(after < before);
    }
}
