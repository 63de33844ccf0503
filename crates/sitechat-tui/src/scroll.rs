//! Transcript scrolling.
//!
//! `ScrollCoordinator` keeps the transcript pinned to its newest line after
//! every session update, easing toward the bottom over a few frames instead
//! of jumping. Between updates the user can scroll freely; the next update
//! pins to the bottom again.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub height: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollCoordinator {
    viewport: Option<Viewport>,
    content_height: usize,
    offset: usize,
    target: usize,
}

impl ScrollCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches (or resizes) the viewport.
    pub fn mount(&mut self, height: usize) {
        let was_pinned = self.viewport.is_none() || self.is_at_bottom();
        self.viewport = Some(Viewport { height });
        if was_pinned {
            self.jump_to_bottom();
        } else {
            self.clamp();
        }
    }

    pub fn unmount(&mut self) {
        self.viewport = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.viewport.is_some()
    }

    /// Starts a smooth scroll to the bottom of `content_height` lines.
    ///
    /// Returns false when no viewport is mounted; nothing changes then.
    pub fn on_session_update(&mut self, content_height: usize) -> bool {
        if self.viewport.is_none() {
            tracing::trace!("scroll update without a mounted viewport");
            return false;
        }
        self.content_height = content_height;
        self.target = self.max_offset();
        self.offset = self.offset.min(self.target);
        true
    }

    /// Records a new content height without re-pinning (re-layout on resize).
    pub fn set_content_height(&mut self, content_height: usize) {
        let was_pinned = self.is_at_bottom();
        self.content_height = content_height;
        if was_pinned {
            self.jump_to_bottom();
        } else {
            self.clamp();
        }
    }

    /// Advances one animation frame. Returns true if the offset moved.
    pub fn tick(&mut self) -> bool {
        if self.offset == self.target {
            return false;
        }
        let distance = self.offset.abs_diff(self.target);
        let step = (distance / 2).max(1);
        if self.offset < self.target {
            self.offset += step;
        } else {
            self.offset -= step;
        }
        true
    }

    /// Runs the animation to completion.
    pub fn settle(&mut self) {
        while self.tick() {}
    }

    pub fn is_animating(&self) -> bool {
        self.offset != self.target
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn content_height(&self) -> usize {
        self.content_height
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport.map_or(0, |v| v.height)
    }

    pub fn max_offset(&self) -> usize {
        self.viewport
            .map_or(0, |v| self.content_height.saturating_sub(v.height))
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
        self.target = self.offset;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_add(lines).min(self.max_offset());
        self.target = self.offset;
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.page_size());
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.page_size());
    }

    /// Scrolls just enough to show `line`.
    pub fn reveal(&mut self, line: usize) {
        let height = self.viewport_height().max(1);
        if line < self.offset {
            self.scroll_up(self.offset - line);
        } else if line >= self.offset + height {
            self.scroll_down(line + 1 - (self.offset + height));
        }
    }

    fn page_size(&self) -> usize {
        self.viewport_height().saturating_sub(1).max(1)
    }

    fn jump_to_bottom(&mut self) {
        self.target = self.max_offset();
        self.offset = self.target;
    }

    fn clamp(&mut self) {
        let max = self.max_offset();
        self.offset = self.offset.min(max);
        self.target = self.target.min(max);
    }
}

const THUMB_SYMBOL: &str = "█";
const TRACK_SYMBOL: &str = "│";

/// Scrollbar whose thumb keeps a fixed length and lands on the last row
/// exactly at maximum scroll.
#[derive(Debug, Clone)]
pub struct Scrollbar {
    total_lines: usize,
    viewport_height: usize,
    offset: usize,
}

impl Scrollbar {
    pub fn new(total_lines: usize, viewport_height: usize, offset: usize) -> Self {
        Self {
            total_lines,
            viewport_height,
            offset,
        }
    }

    pub fn from_coordinator(scroll: &ScrollCoordinator) -> Self {
        Self::new(
            scroll.content_height(),
            scroll.viewport_height(),
            scroll.offset(),
        )
    }

    fn should_display(&self) -> bool {
        self.total_lines > self.viewport_height
    }

    /// Thumb start row and length for a track of `track_len` rows.
    fn thumb(&self, track_len: usize) -> Option<(usize, usize)> {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        if !self.should_display() || track_len == 0 || max_scroll == 0 {
            return None;
        }

        let visible = self.viewport_height.min(track_len);
        let denom = (self.total_lines - 1 + visible) as u64;
        let len = ((track_len as u64 * visible as u64 + denom / 2) / denom) as usize;
        let len = len.clamp(1, track_len);

        let travel = (track_len - len) as u64;
        let start = (self.offset.min(max_scroll) as u64 * travel / max_scroll as u64) as usize;
        Some((start, len))
    }
}

impl Widget for Scrollbar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some((start, len)) = self.thumb(area.height as usize) else {
            return;
        };
        let x = area.x + area.width.saturating_sub(1);
        for (row, y) in (area.y..area.y + area.height).enumerate() {
            let symbol = if (start..start + len).contains(&row) {
                THUMB_SYMBOL
            } else {
                TRACK_SYMBOL
            };
            buf.set_string(x, y, symbol, ratatui::style::Style::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted(height: usize) -> ScrollCoordinator {
        let mut scroll = ScrollCoordinator::new();
        scroll.mount(height);
        scroll
    }

    #[test]
    fn test_update_without_viewport_is_noop() {
        let mut scroll = ScrollCoordinator::new();
        assert!(!scroll.on_session_update(50));
        assert_eq!(scroll.offset(), 0);
        assert_eq!(scroll.content_height(), 0);
    }

    #[test]
    fn test_update_eases_to_bottom() {
        let mut scroll = mounted(10);
        assert!(scroll.on_session_update(50));
        assert!(scroll.is_animating());

        let mut frames = 0;
        while scroll.tick() {
            frames += 1;
        }
        assert!(frames > 1);
        assert_eq!(scroll.offset(), 40);
        assert!(scroll.is_at_bottom());
    }

    #[test]
    fn test_bottom_pinned_after_each_update() {
        for updates in [1usize, 10, 100] {
            let mut scroll = mounted(8);
            for i in 1..=updates {
                scroll.on_session_update(3 * i);
                scroll.settle();
                assert_eq!(scroll.offset(), scroll.max_offset());
            }
        }
    }

    #[test]
    fn test_manual_scroll_until_next_update() {
        let mut scroll = mounted(10);
        scroll.on_session_update(40);
        scroll.settle();

        scroll.scroll_up(5);
        assert_eq!(scroll.offset(), 25);
        assert!(!scroll.tick());

        scroll.page_up();
        assert_eq!(scroll.offset(), 16);
        scroll.scroll_down(1000);
        assert_eq!(scroll.offset(), 30);

        scroll.scroll_up(3);
        scroll.on_session_update(41);
        scroll.settle();
        assert_eq!(scroll.offset(), 31);
    }

    #[test]
    fn test_resize_keeps_bottom_pin() {
        let mut scroll = mounted(10);
        scroll.on_session_update(40);
        scroll.settle();

        scroll.mount(20);
        assert_eq!(scroll.offset(), 20);

        scroll.scroll_up(5);
        scroll.mount(30);
        assert_eq!(scroll.offset(), 10);
    }

    #[test]
    fn test_reveal_scrolls_minimally() {
        let mut scroll = mounted(10);
        scroll.on_session_update(100);
        scroll.settle();

        scroll.reveal(95);
        assert_eq!(scroll.offset(), 90);
        scroll.reveal(50);
        assert_eq!(scroll.offset(), 50);
        scroll.reveal(70);
        assert_eq!(scroll.offset(), 61);
    }

    #[test]
    fn test_scrollbar_hidden_when_content_fits() {
        assert!(!Scrollbar::new(10, 20, 0).should_display());
        assert!(!Scrollbar::new(20, 20, 0).should_display());
        assert!(Scrollbar::new(100, 20, 0).should_display());
    }

    #[test]
    fn test_scrollbar_thumb_is_stable_and_reaches_bottom() {
        let top = Scrollbar::new(100, 20, 0).thumb(20).unwrap();
        let mid = Scrollbar::new(100, 20, 40).thumb(20).unwrap();
        let bottom = Scrollbar::new(100, 20, 80).thumb(20).unwrap();

        assert_eq!(top.0, 0);
        assert_eq!(top.1, mid.1);
        assert_eq!(mid.1, bottom.1);
        assert_eq!(bottom.0 + bottom.1, 20);
    }
}
