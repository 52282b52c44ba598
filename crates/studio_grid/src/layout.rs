use std::collections::HashMap;
use std::sync::Arc;

use crate::GridConfig;
use crate::model::ColumnSpec;

/// Column widths, display order and the pinned column.
///
/// Column indices are data indices (position in the query result). Widths are
/// keyed by column name so they survive a reload that keeps the same columns.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    names: Vec<Arc<str>>,
    widths: HashMap<Arc<str>, f32>,

    /// Display position -> data index.
    order: Vec<usize>,

    pinned: Option<usize>,
    default_width: f32,
    min_width: f32,
}

impl ColumnLayout {
    pub fn new(columns: &[ColumnSpec], config: &GridConfig) -> Self {
        let mut layout = Self {
            names: Vec::new(),
            widths: HashMap::new(),
            order: Vec::new(),
            pinned: None,
            default_width: config.default_column_width,
            min_width: config.min_column_width,
        };
        layout.reset_columns(columns);
        layout
    }

    /// Replace the column set. Widths and the pin carry over by name; the
    /// display order resets to data order.
    pub fn reset_columns(&mut self, columns: &[ColumnSpec]) {
        let pinned_name = self.pinned.and_then(|ix| self.names.get(ix).cloned());

        self.names = columns.iter().map(|c| c.name.clone()).collect();
        self.widths.retain(|name, _| self.names.contains(name));
        self.order = (0..self.names.len()).collect();
        self.pinned = pinned_name.and_then(|name| self.names.iter().position(|n| *n == name));
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    pub fn min_width(&self) -> f32 {
        self.min_width
    }

    pub fn width(&self, col: usize) -> f32 {
        self.names
            .get(col)
            .and_then(|name| self.widths.get(name))
            .copied()
            .unwrap_or(self.default_width)
    }

    /// Set an absolute width, floored at the minimum.
    pub fn set_width(&mut self, col: usize, width: f32) {
        let Some(name) = self.names.get(col) else {
            log::warn!("[LAYOUT] set_width on missing column {}", col);
            return;
        };

        let width = if width.is_finite() {
            width.max(self.min_width)
        } else {
            self.min_width
        };
        self.widths.insert(name.clone(), width);
    }

    /// Drag-resize by `delta` pixels. Returns the resulting width.
    pub fn resize_column(&mut self, col: usize, delta: f32) -> f32 {
        if col >= self.names.len() {
            log::warn!("[LAYOUT] resize_column on missing column {}", col);
            return self.min_width;
        }

        self.set_width(col, self.width(col) + delta);
        self.width(col)
    }

    /// Data indices in display order.
    pub fn display_order(&self) -> &[usize] {
        &self.order
    }

    pub fn display_position(&self, col: usize) -> Option<usize> {
        self.order.iter().position(|&c| c == col)
    }

    /// Move the column at display position `from` to display position `to`.
    pub fn move_column(&mut self, from: usize, to: usize) {
        if from >= self.order.len() || to >= self.order.len() || from == to {
            return;
        }

        let col = self.order.remove(from);
        self.order.insert(to, col);
    }

    pub fn pinned(&self) -> Option<usize> {
        self.pinned
    }

    pub fn pin_column(&mut self, col: Option<usize>) {
        self.pinned = col.filter(|&c| c < self.names.len());
    }

    /// Left edges in display order plus the total width as the last entry.
    pub fn column_offsets(&self) -> Vec<f32> {
        let mut offsets = Vec::with_capacity(self.order.len() + 1);
        let mut x = 0.0;
        offsets.push(x);
        for &col in &self.order {
            x += self.width(col);
            offsets.push(x);
        }
        offsets
    }

    pub fn total_width(&self) -> f32 {
        self.order.iter().map(|&col| self.width(col)).sum()
    }

    /// Left edge of a column in content coordinates.
    pub fn column_left(&self, col: usize) -> Option<f32> {
        let position = self.display_position(col)?;
        Some(self.order[..position].iter().map(|&c| self.width(c)).sum())
    }

    /// Left edge of a column relative to the viewport. The pinned column
    /// sticks at the left border once its natural position scrolls past it.
    pub fn screen_x(&self, col: usize, scroll_x: f32) -> Option<f32> {
        let natural = self.column_left(col)? - scroll_x;

        if self.pinned == Some(col) {
            Some(natural.max(0.0))
        } else {
            Some(natural)
        }
    }

    /// Columns intersecting the viewport, in display order. The pinned column
    /// is always included.
    pub fn visible_columns(&self, scroll_x: f32, viewport_width: f32) -> Vec<usize> {
        let view_left = scroll_x.max(0.0);
        let view_right = view_left + viewport_width.max(0.0);

        let mut visible = Vec::new();
        let mut left = 0.0;
        for &col in &self.order {
            let right = left + self.width(col);
            if (right > view_left && left < view_right) || self.pinned == Some(col) {
                visible.push(col);
            }
            left = right;
        }
        visible
    }

    /// Column under a viewport-relative `x`, checking the pinned column first.
    pub fn hit_test(&self, x: f32, scroll_x: f32) -> Option<usize> {
        if x < 0.0 {
            return None;
        }

        if let Some(pinned) = self.pinned
            && let Some(left) = self.screen_x(pinned, scroll_x)
            && x >= left
            && x < left + self.width(pinned)
        {
            return Some(pinned);
        }

        let content_x = x + scroll_x;
        let mut left = 0.0;
        for &col in &self.order {
            let right = left + self.width(col);
            if content_x >= left && content_x < right {
                return Some(col);
            }
            left = right;
        }
        None
    }
}
