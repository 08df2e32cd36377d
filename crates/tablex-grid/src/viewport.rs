//! Virtualized window calculator
//!
//! Works out which rows intersect the viewport so only those (plus an overscan
//! margin) are rendered. Rows are assumed to be `estimate_row_size` tall until
//! measured; measuring a row above the visible area shifts the scroll offset by the
//! size difference so the visible content stays in place.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::persist::{Persistence, scroll_anchor_key};

/// The slice of rows to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderWindow {
    /// First rendered row
    pub start_index: usize,
    /// One past the last rendered row
    pub end_index: usize,
    /// Distance from the top of the track to `start_index`
    pub offset: f32,
    /// Height of the whole track
    pub total_size: f32,
}

impl RenderWindow {
    pub fn empty() -> Self {
        Self {
            start_index: 0,
            end_index: 0,
            offset: 0.0,
            total_size: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end_index <= self.start_index
    }

    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn range(&self) -> Range<usize> {
        self.start_index..self.end_index
    }

    /// Last rendered row, inclusive
    pub fn last_index(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.end_index - 1)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    row_count: usize,
    estimate_row_size: f32,
    viewport_extent: f32,
    scroll_offset: f32,
    overscan: usize,
    measured: BTreeMap<usize, f32>,
    source_identity: Option<String>,
    persistence: Persistence,
}

impl Viewport {
    pub fn new(estimate_row_size: f32, overscan: usize, persistence: Persistence) -> Self {
        Self {
            row_count: 0,
            estimate_row_size: estimate_row_size.max(1.0),
            viewport_extent: 0.0,
            scroll_offset: 0.0,
            overscan,
            measured: BTreeMap::new(),
            source_identity: None,
            persistence,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn viewport_extent(&self) -> f32 {
        self.viewport_extent
    }

    pub fn set_viewport_extent(&mut self, extent: f32) {
        self.viewport_extent = if extent.is_finite() { extent.max(0.0) } else { 0.0 };
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
    }

    /// Record a scroll position. Negative and non-finite offsets count as the top.
    ///
    /// Not written to storage; see [`persist_anchor`](Self::persist_anchor).
    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.scroll_offset = if offset.is_finite() { offset.max(0.0) } else { 0.0 };
    }

    /// A new page arrived; measurements past the new end are forgotten
    pub fn set_row_count(&mut self, row_count: usize) {
        if row_count != self.row_count {
            self.measured.retain(|index, _| *index < row_count);
            self.row_count = row_count;
        }
    }

    /// The row set was replaced (filter or sort change): back to the top
    pub fn reset_scroll(&mut self) {
        self.measured.clear();
        self.set_scroll_offset(0.0);
    }

    /// Record the actual rendered size of a row
    pub fn measure(&mut self, index: usize, size: f32) {
        if index >= self.row_count || !size.is_finite() || size <= 0.0 {
            return;
        }
        let previous = self.size_of(index);
        if previous == size {
            return;
        }

        let first_visible = self.first_visible_index(self.effective_scroll());
        self.measured.insert(index, size);

        if index < first_visible {
            self.scroll_offset = (self.scroll_offset + size - previous).max(0.0);
        }
    }

    pub fn size_of(&self, index: usize) -> f32 {
        self.measured
            .get(&index)
            .copied()
            .unwrap_or(self.estimate_row_size)
    }

    /// Distance from the top of the track to the start of row `index`
    pub fn offset_of(&self, index: usize) -> f32 {
        let correction: f32 = self
            .measured
            .range(..index)
            .map(|(_, size)| size - self.estimate_row_size)
            .sum();
        index as f32 * self.estimate_row_size + correction
    }

    pub fn total_size(&self) -> f32 {
        self.offset_of(self.row_count)
    }

    pub fn window(&self) -> RenderWindow {
        if self.row_count == 0 || self.viewport_extent <= 0.0 {
            return RenderWindow {
                total_size: self.total_size(),
                ..RenderWindow::empty()
            };
        }

        let scroll = self.effective_scroll();
        let bottom = scroll + self.viewport_extent;

        let first_visible = self.first_visible_index(scroll);
        let visible_end = partition(self.row_count, |i| self.offset_of(i) < bottom)
            .max(first_visible + 1);

        let start_index = first_visible.saturating_sub(self.overscan);
        let end_index = visible_end
            .saturating_add(self.overscan)
            .min(self.row_count);

        RenderWindow {
            start_index,
            end_index,
            offset: self.offset_of(start_index),
            total_size: self.total_size(),
        }
    }

    /// Switch to another data source, restoring its persisted scroll anchor
    pub fn switch_source(&mut self, identity: impl Into<String>) {
        let identity = identity.into();
        self.persist_anchor();
        self.measured.clear();
        self.row_count = 0;
        self.scroll_offset = self
            .persistence
            .load_parsed::<f32>(&scroll_anchor_key(&identity))
            .filter(|offset| offset.is_finite() && *offset >= 0.0)
            .unwrap_or(0.0);
        self.source_identity = Some(identity);
    }

    /// Scroll offset clamped to the scrollable range
    fn effective_scroll(&self) -> f32 {
        let max_scroll = (self.total_size() - self.viewport_extent).max(0.0);
        self.scroll_offset.min(max_scroll)
    }

    fn first_visible_index(&self, scroll: f32) -> usize {
        partition(self.row_count, |i| self.offset_of(i + 1) <= scroll)
            .min(self.row_count.saturating_sub(1))
    }

    /// Write the scroll offset of the current source to storage
    pub fn persist_anchor(&self) {
        if let Some(identity) = &self.source_identity {
            self.persistence
                .save(&scroll_anchor_key(identity), &self.scroll_offset.to_string());
        }
    }
}

/// Index of the first `i` in `0..count` for which `pred` is false. `pred` must be
/// true for a prefix of the range and false afterwards.
fn partition(count: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut low, mut high) = (0, count);
    while low < high {
        let mid = low + (high - low) / 2;
        if pred(mid) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tablex_core::{KeyValueStore, MemoryKeyValueStore};

    fn viewport(rows: usize) -> Viewport {
        let mut viewport = Viewport::new(36.0, 5, Persistence::disabled());
        viewport.set_row_count(rows);
        viewport.set_viewport_extent(360.0);
        viewport
    }

    #[test]
    fn test_window_at_top() {
        let window = viewport(1000).window();
        assert_eq!(window.range(), 0..15);
        assert_eq!(window.offset, 0.0);
        assert_eq!(window.total_size, 36_000.0);
    }

    #[test]
    fn test_window_scrolled() {
        let mut viewport = viewport(1000);
        viewport.set_scroll_offset(3600.0);

        let window = viewport.window();
        assert_eq!(window.range(), 95..115);
        assert_eq!(window.offset, 95.0 * 36.0);
        assert_eq!(window.last_index(), Some(114));
    }

    #[test]
    fn test_partial_row_at_top_is_visible() {
        let mut viewport = viewport(1000);
        viewport.set_overscan(0);
        viewport.set_scroll_offset(40.0);

        assert_eq!(viewport.window().range(), 1..12);
    }

    #[test]
    fn test_scroll_past_end_is_clamped() {
        let mut viewport = viewport(20);
        viewport.set_scroll_offset(1e9);

        let window = viewport.window();
        assert_eq!(window.end_index, 20);
        assert!(window.start_index <= 10);
    }

    #[test]
    fn test_small_row_set_fits() {
        let window = viewport(3).window();
        assert_eq!(window.range(), 0..3);
    }

    #[test]
    fn test_empty_inputs_yield_empty_window() {
        assert!(viewport(0).window().is_empty());

        let mut zero_extent = viewport(100);
        zero_extent.set_viewport_extent(0.0);
        assert!(zero_extent.window().is_empty());
        assert_eq!(zero_extent.window().last_index(), None);
    }

    #[test]
    fn test_measure_above_first_visible_row_keeps_content_in_place() {
        let mut viewport = viewport(1000);
        viewport.set_scroll_offset(3600.0);
        let first_row_top = viewport.offset_of(100) - viewport.scroll_offset();

        viewport.measure(10, 72.0);

        assert_eq!(viewport.scroll_offset(), 3636.0);
        assert_eq!(viewport.offset_of(100) - viewport.scroll_offset(), first_row_top);
        assert_eq!(viewport.total_size(), 36_036.0);
    }

    #[test]
    fn test_measure_below_viewport_does_not_scroll() {
        let mut viewport = viewport(1000);
        viewport.measure(500, 10.0);
        assert_eq!(viewport.scroll_offset(), 0.0);
        viewport.measure(5000, 10.0);
        viewport.measure(1, -3.0);
        assert_eq!(viewport.size_of(1), 36.0);
    }

    #[test]
    fn test_reset_scroll_on_row_set_change() {
        let mut viewport = viewport(1000);
        viewport.set_scroll_offset(720.0);
        viewport.measure(3, 50.0);

        viewport.reset_scroll();

        assert_eq!(viewport.scroll_offset(), 0.0);
        assert_eq!(viewport.size_of(3), 36.0);
        assert_eq!(viewport.window().start_index, 0);
    }

    #[test]
    fn test_row_count_change_drops_stale_measurements() {
        let mut viewport = viewport(100);
        viewport.measure(80, 50.0);
        viewport.set_row_count(50);
        viewport.set_row_count(100);
        assert_eq!(viewport.size_of(80), 36.0);
    }

    #[test]
    fn test_scroll_anchor_persisted_per_source() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut viewport = Viewport::new(36.0, 5, Persistence::new(store.clone()));
        viewport.switch_source("conn-a");
        for step in 1..=20 {
            viewport.set_scroll_offset(step as f32 * 36.0);
        }
        assert!(store.is_empty());

        viewport.switch_source("conn-b");
        assert_eq!(
            store.get("conn-a_scroll_anchor").unwrap().as_deref(),
            Some("720")
        );
        assert_eq!(viewport.scroll_offset(), 0.0);

        viewport.switch_source("conn-a");
        assert_eq!(viewport.scroll_offset(), 720.0);
        assert_eq!(store.get("conn-b_scroll_anchor").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_persist_anchor_writes_current_offset() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut viewport = Viewport::new(36.0, 5, Persistence::new(store.clone()));
        viewport.persist_anchor();
        assert!(store.is_empty());

        viewport.switch_source("conn-a");
        viewport.set_scroll_offset(90.5);
        viewport.persist_anchor();
        assert_eq!(
            store.get("conn-a_scroll_anchor").unwrap().as_deref(),
            Some("90.5")
        );
    }

    #[test]
    fn test_partition() {
        assert_eq!(partition(10, |i| i < 4), 4);
        assert_eq!(partition(10, |_| true), 10);
        assert_eq!(partition(0, |_| true), 0);
    }
}
