use std::ops::Range;

/// Rows to materialize for the current scroll position. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Blank space rendered around the materialized rows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub top: f32,
    pub bottom: f32,
}

/// Compute the rows to render for a scroll position, widened by
/// `render_ahead` rows on both sides.
///
/// Always satisfies `start <= end <= row_count`. A non-positive row height
/// yields an empty range.
pub fn compute_visible_range(
    scroll_top: f32,
    viewport_height: f32,
    row_height: f32,
    row_count: usize,
    render_ahead: usize,
) -> VisibleRange {
    if row_count == 0 || !(row_height > 0.0) {
        return VisibleRange::default();
    }

    let scroll_top = scroll_top.max(0.0);
    let viewport_height = viewport_height.max(0.0);

    let first = (scroll_top / row_height).floor() as usize;
    let last = ((scroll_top + viewport_height) / row_height).ceil() as usize;

    let end = last.saturating_add(render_ahead).min(row_count);
    let start = first.saturating_sub(render_ahead).min(end);

    VisibleRange { start, end }
}

/// Paddings that keep the scrollable height equal to `row_count * row_height`.
pub fn compute_padding(start: usize, end: usize, row_count: usize, row_height: f32) -> Padding {
    let end = end.min(row_count);
    let start = start.min(end);

    Padding {
        top: start as f32 * row_height,
        bottom: (row_count - end) as f32 * row_height,
    }
}

/// Scroll position and viewport geometry of a grid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f32,
    pub height: f32,
    pub row_height: f32,
    pub render_ahead: usize,
}

impl Viewport {
    pub fn new(row_height: f32, render_ahead: usize) -> Self {
        Self {
            scroll_top: 0.0,
            height: 0.0,
            row_height,
            render_ahead,
        }
    }

    pub fn set_scroll_top(&mut self, scroll_top: f32) {
        self.scroll_top = scroll_top.max(0.0);
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height.max(0.0);
    }

    pub fn visible_range(&self, row_count: usize) -> VisibleRange {
        compute_visible_range(
            self.scroll_top,
            self.height,
            self.row_height,
            row_count,
            self.render_ahead,
        )
    }

    pub fn padding(&self, row_count: usize) -> Padding {
        let range = self.visible_range(row_count);
        compute_padding(range.start, range.end, row_count, self.row_height)
    }

    pub fn total_height(&self, row_count: usize) -> f32 {
        row_count as f32 * self.row_height
    }

    /// Adjust the scroll offset by the minimum amount that brings `row` fully
    /// into view.
    pub fn scroll_to_row(&mut self, row: usize, row_count: usize) {
        if row >= row_count {
            return;
        }

        let row_top = row as f32 * self.row_height;
        let row_bottom = row_top + self.row_height;

        if row_top < self.scroll_top {
            self.scroll_top = row_top;
        } else if row_bottom > self.scroll_top + self.height {
            self.scroll_top = (row_bottom - self.height).max(0.0);
        }

        let max_scroll = (self.total_height(row_count) - self.height).max(0.0);
        self.scroll_top = self.scroll_top.min(max_scroll);
    }
}
