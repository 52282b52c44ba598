use std::collections::BTreeSet;

/// Coordinate of a cell in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Direction for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Edge for navigation (Home/End, Ctrl+Home/Ctrl+End).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
    Home,
    End,
}

/// Focus cell plus the set of selected rows.
///
/// - `focus`: the cell keyboard input applies to (moves with arrows and clicks)
/// - `anchor`: row a shift range is measured from (set by plain and ctrl
///   clicks, kept while the range is extended)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    focus: Option<CellCoord>,
    anchor: Option<usize>,
    selected: BTreeSet<usize>,
    drag_origin: Option<usize>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Option<CellCoord> {
        self.focus
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Selected rows in ascending order.
    pub fn selected_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_row_selected(&self, row: usize) -> bool {
        self.selected.contains(&row)
    }

    pub fn is_focused(&self, coord: CellCoord) -> bool {
        self.focus == Some(coord)
    }

    pub fn is_empty(&self) -> bool {
        self.focus.is_none() && self.selected.is_empty()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Plain click: focus the cell and select only its row.
    pub fn click(&mut self, row: usize, col: usize) {
        self.focus = Some(CellCoord::new(row, col));
        self.anchor = Some(row);
        self.selected.clear();
        self.selected.insert(row);
    }

    /// Toggle one row in or out of the selection. The focused column is kept.
    pub fn ctrl_click(&mut self, row: usize) {
        if !self.selected.remove(&row) {
            self.selected.insert(row);
        }

        let col = self.focus.map(|f| f.col).unwrap_or(0);
        self.focus = Some(CellCoord::new(row, col));
        self.anchor = Some(row);
    }

    /// Select the inclusive range between the anchor row and `row`. The
    /// anchor is the row of the last plain or ctrl click, so consecutive
    /// shift-clicks pivot on it rather than on the previous shift target.
    pub fn shift_click(&mut self, row: usize) {
        let anchor = self.range_anchor().unwrap_or(row);
        self.select_range(anchor, row);

        let col = self.focus.map(|f| f.col).unwrap_or(0);
        self.focus = Some(CellCoord::new(row, col));
        self.anchor = Some(anchor);
    }

    /// Secondary click. Collapses to the clicked row unless a multi-row
    /// selection is already active. Returns the rows a context action targets.
    pub fn right_click(&mut self, row: usize, col: usize) -> Vec<usize> {
        if self.selected.len() < 2 {
            self.click(row, col);
        }

        self.selected.iter().copied().collect()
    }

    /// Arrow-key navigation clamped to the grid. With `extend` the selection
    /// grows from the anchor instead of collapsing.
    pub fn move_focus(
        &mut self,
        direction: Direction,
        extend: bool,
        row_count: usize,
        col_count: usize,
    ) {
        if row_count == 0 || col_count == 0 {
            return;
        }

        let Some(current) = self.focus else {
            self.click(0, 0);
            return;
        };

        let target = match direction {
            Direction::Up => CellCoord::new(current.row.saturating_sub(1), current.col),
            Direction::Down => CellCoord::new((current.row + 1).min(row_count - 1), current.col),
            Direction::Left => CellCoord::new(current.row, current.col.saturating_sub(1)),
            Direction::Right => CellCoord::new(current.row, (current.col + 1).min(col_count - 1)),
        };

        self.move_to(target, extend);
    }

    pub fn move_to_edge(&mut self, edge: Edge, extend: bool, row_count: usize, col_count: usize) {
        if row_count == 0 || col_count == 0 {
            return;
        }

        let current = self.focus.unwrap_or(CellCoord::new(0, 0));
        let target = match edge {
            Edge::Top => CellCoord::new(0, current.col),
            Edge::Bottom => CellCoord::new(row_count - 1, current.col),
            Edge::Left => CellCoord::new(current.row, 0),
            Edge::Right => CellCoord::new(current.row, col_count - 1),
            Edge::Home => CellCoord::new(0, 0),
            Edge::End => CellCoord::new(row_count - 1, col_count - 1),
        };

        self.move_to(target, extend);
    }

    /// Select every row. Focus is kept, or placed on the first cell.
    pub fn select_all(&mut self, row_count: usize, col_count: usize) {
        if row_count == 0 || col_count == 0 {
            self.clear();
            return;
        }

        self.selected = (0..row_count).collect();
        if self.focus.is_none() {
            self.focus = Some(CellCoord::new(0, 0));
        }
        self.anchor = Some(0);
    }

    /// Mouse down on a row starts a drag selection.
    pub fn begin_drag(&mut self, row: usize, col: usize) {
        self.click(row, col);
        self.drag_origin = Some(row);
    }

    /// Pointer moved over `row` while dragging.
    pub fn drag_over(&mut self, row: usize) {
        let Some(origin) = self.drag_origin else {
            return;
        };

        self.select_range(origin, row);
        let col = self.focus.map(|f| f.col).unwrap_or(0);
        self.focus = Some(CellCoord::new(row, col));
    }

    pub fn end_drag(&mut self) {
        self.drag_origin = None;
    }

    /// Re-index after `row` was physically removed from the grid.
    pub fn row_removed(&mut self, row: usize, row_count: usize) {
        self.selected = self
            .selected
            .iter()
            .filter(|&&r| r != row)
            .map(|&r| if r > row { r - 1 } else { r })
            .collect();

        self.focus = match self.focus {
            Some(_) if row_count == 0 => None,
            Some(focus) if focus.row > row => Some(CellCoord::new(focus.row - 1, focus.col)),
            Some(focus) if focus.row == row => {
                Some(CellCoord::new(focus.row.min(row_count - 1), focus.col))
            }
            other => other,
        };

        self.anchor = self.anchor.and_then(|a| match a.cmp(&row) {
            std::cmp::Ordering::Less => Some(a),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(a - 1),
        });
        self.drag_origin = None;
    }

    /// Re-index after `count` rows were inserted at position `at`.
    pub fn rows_inserted(&mut self, at: usize, count: usize) {
        let shift = |r: usize| if r >= at { r + count } else { r };

        self.selected = self.selected.iter().map(|&r| shift(r)).collect();
        self.focus = self.focus.map(|f| CellCoord::new(shift(f.row), f.col));
        self.anchor = self.anchor.map(shift);
        self.drag_origin = self.drag_origin.map(shift);
    }

    fn move_to(&mut self, target: CellCoord, extend: bool) {
        if extend {
            let anchor = self.range_anchor().unwrap_or(target.row);
            self.select_range(anchor, target.row);
            self.anchor = Some(anchor);
            self.focus = Some(target);
        } else {
            self.click(target.row, target.col);
        }
    }

    fn range_anchor(&self) -> Option<usize> {
        self.anchor.or(self.focus.map(|f| f.row))
    }

    fn select_range(&mut self, a: usize, b: usize) {
        self.selected = (a.min(b)..=a.max(b)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(sel: &SelectionState) -> Vec<usize> {
        sel.selected_rows().collect()
    }

    #[test]
    fn click_resets_selection_to_one_row() {
        let mut sel = SelectionState::new();
        sel.click(2, 1);
        sel.ctrl_click(4);
        sel.click(7, 3);

        assert_eq!(rows(&sel), vec![7]);
        assert_eq!(sel.focus(), Some(CellCoord::new(7, 3)));
    }

    #[test]
    fn shift_click_selects_range_in_either_direction() {
        let mut sel = SelectionState::new();
        sel.click(5, 0);
        sel.shift_click(2);
        assert_eq!(rows(&sel), vec![2, 3, 4, 5]);

        let mut sel = SelectionState::new();
        sel.click(2, 0);
        sel.shift_click(5);
        assert_eq!(rows(&sel), vec![2, 3, 4, 5]);

        sel.shift_click(3);
        assert_eq!(rows(&sel), vec![2, 3]);
        assert_eq!(sel.anchor(), Some(2));
    }

    #[test]
    fn ctrl_click_toggles_and_keeps_column() {
        let mut sel = SelectionState::new();
        sel.click(1, 4);
        sel.ctrl_click(3);
        assert_eq!(rows(&sel), vec![1, 3]);
        assert_eq!(sel.focus(), Some(CellCoord::new(3, 4)));

        sel.ctrl_click(1);
        assert_eq!(rows(&sel), vec![3]);
    }

    #[test]
    fn right_click_collapses_only_small_selections() {
        let mut sel = SelectionState::new();
        sel.click(1, 0);
        assert_eq!(sel.right_click(6, 2), vec![6]);
        assert_eq!(sel.focus(), Some(CellCoord::new(6, 2)));

        sel.shift_click(8);
        assert_eq!(sel.right_click(2, 0), vec![6, 7, 8]);
    }

    #[test]
    fn move_focus_clamps_and_extends() {
        let mut sel = SelectionState::new();
        sel.move_focus(Direction::Down, false, 3, 2);
        assert_eq!(sel.focus(), Some(CellCoord::new(0, 0)));

        sel.move_focus(Direction::Left, false, 3, 2);
        assert_eq!(sel.focus(), Some(CellCoord::new(0, 0)));

        sel.move_focus(Direction::Down, true, 3, 2);
        sel.move_focus(Direction::Down, true, 3, 2);
        sel.move_focus(Direction::Down, true, 3, 2);
        assert_eq!(sel.focus(), Some(CellCoord::new(2, 0)));
        assert_eq!(rows(&sel), vec![0, 1, 2]);

        sel.move_focus(Direction::Right, false, 3, 2);
        assert_eq!(sel.focus(), Some(CellCoord::new(2, 1)));
        assert_eq!(rows(&sel), vec![2]);
    }

    #[test]
    fn edges_and_select_all() {
        let mut sel = SelectionState::new();
        sel.click(3, 1);
        sel.move_to_edge(Edge::End, false, 10, 4);
        assert_eq!(sel.focus(), Some(CellCoord::new(9, 3)));

        sel.move_to_edge(Edge::Top, true, 10, 4);
        assert_eq!(sel.selected_count(), 10);

        sel.clear();
        sel.select_all(4, 2);
        assert_eq!(rows(&sel), vec![0, 1, 2, 3]);
        assert_eq!(sel.focus(), Some(CellCoord::new(0, 0)));
    }

    #[test]
    fn drag_selects_contiguous_rows() {
        let mut sel = SelectionState::new();
        sel.begin_drag(4, 1);
        sel.drag_over(6);
        sel.drag_over(2);
        sel.end_drag();

        assert_eq!(rows(&sel), vec![2, 3, 4]);
        assert!(!sel.is_dragging());

        sel.drag_over(9);
        assert_eq!(rows(&sel), vec![2, 3, 4]);
    }

    #[test]
    fn reindexing_after_row_removal() {
        let mut sel = SelectionState::new();
        sel.click(1, 0);
        sel.ctrl_click(3);
        sel.ctrl_click(5);

        sel.row_removed(3, 5);
        assert_eq!(rows(&sel), vec![1, 4]);
        assert_eq!(sel.focus(), Some(CellCoord::new(4, 0)));
    }

    #[test]
    fn repeated_shift_clicks_pivot_on_the_anchor() {
        let mut sel = SelectionState::new();
        sel.click(2, 0);
        sel.shift_click(5);
        assert_eq!(rows(&sel), vec![2, 3, 4, 5]);

        sel.shift_click(3);
        assert_eq!(rows(&sel), vec![2, 3]);
        assert_eq!(sel.focus(), Some(CellCoord::new(3, 0)));
    }
}
