use std::collections::BTreeMap;

use studio_core::{QueryResult, QueryStats, Record, Row, RowState, TableSchema, Value};
use uuid::Uuid;

use crate::events::{EventBus, GridEvent, SortState, next_sort_state};
use crate::layout::ColumnLayout;
use crate::model::{ColumnSpec, RowChange, RowStatus, parse_cell_input};
use crate::selection::{CellCoord, Direction, Edge, SelectionState};
use crate::viewport::{Padding, VisibleRange, compute_padding, compute_visible_range};
use crate::{GridConfig, GridError, ValidationError};

/// Canonical values returned for a committed row.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub row_index: usize,
    pub values: Record,
}

/// Loaded rows plus the overlay of pending edits.
///
/// Base rows are the last canonical data from the database. Client-side
/// inserts live at the end of `rows` with every base cell set to
/// [`Value::Default`] and their values in the overlay, so row indices are
/// stable until a row is physically removed.
pub struct TableState {
    pub(crate) id: Uuid,
    pub(crate) config: GridConfig,
    pub(crate) schema: Option<TableSchema>,
    pub(crate) columns: Vec<ColumnSpec>,
    pub(crate) rows: Vec<Row>,
    pub(crate) changes: BTreeMap<usize, RowChange>,
    pub(crate) row_states: BTreeMap<usize, RowState>,
    pub(crate) selection: SelectionState,
    pub(crate) layout: ColumnLayout,
    pub(crate) sort: Option<SortState>,
    pub(crate) stats: QueryStats,
    pub(crate) commit_in_flight: bool,
    pub(crate) commit_sequence: u64,
    pub(crate) events: EventBus,
}

impl TableState {
    pub fn new(result: &QueryResult, config: GridConfig) -> Self {
        let config = config.normalized();
        let columns: Vec<ColumnSpec> = result.columns.iter().map(ColumnSpec::from).collect();
        let layout = ColumnLayout::new(&columns, &config);

        let mut state = Self {
            id: Uuid::new_v4(),
            config,
            schema: None,
            columns,
            rows: Vec::new(),
            changes: BTreeMap::new(),
            row_states: BTreeMap::new(),
            selection: SelectionState::new(),
            layout,
            sort: None,
            stats: result.stats.clone(),
            commit_in_flight: false,
            commit_sequence: 0,
            events: EventBus::new(),
        };
        state.rows = result
            .rows
            .iter()
            .map(|row| state.normalize_row(row.clone()))
            .collect();

        log::debug!(
            "[LOAD] {} rows x {} columns",
            state.rows.len(),
            state.columns.len()
        );
        state
    }

    /// Annotate columns with key, nullability and foreign key metadata.
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        for column in &mut self.columns {
            column.annotate(&schema);
        }
        self.schema = Some(schema);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Identity of the loaded data. Changes on every reload.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| &*c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_commit_in_flight(&self) -> bool {
        self.commit_in_flight
    }

    // --- Values ---

    /// Overlay value if present, else the base value.
    pub fn value(&self, row: usize, col: usize) -> Option<&Value> {
        if let Some(value) = self.changes.get(&row).and_then(|c| c.value(col)) {
            return Some(value);
        }
        self.rows.get(row)?.get(col)
    }

    pub fn base_value(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row)?.get(col)
    }

    pub fn base_row(&self, row: usize) -> Option<&Row> {
        self.rows.get(row)
    }

    /// Cell text for rendering, truncated to `max_display_len` characters.
    pub fn display_value(&self, row: usize, col: usize) -> Option<String> {
        self.value(row, col)
            .map(|v| v.as_display_string_truncated(self.config.max_display_len))
    }

    /// Current values of a row (overlay applied) keyed by column name.
    pub fn row_record(&self, row: usize) -> Option<Record> {
        if row >= self.rows.len() {
            return None;
        }

        Some(
            self.columns
                .iter()
                .enumerate()
                .filter_map(|(col, spec)| {
                    self.value(row, col)
                        .map(|v| (spec.name.to_string(), v.clone()))
                })
                .collect(),
        )
    }

    /// Write into the overlay. Writing the base value back removes the entry.
    pub fn set_value(&mut self, row: usize, col: usize, value: Value) {
        let Some(base) = self.base_value(row, col) else {
            log::warn!("[EDIT] set_value out of range: row {} col {}", row, col);
            return;
        };

        if *base == value {
            if let Some(change) = self.changes.get_mut(&row) {
                change.values.remove(&col);
                if change.is_empty() {
                    self.changes.remove(&row);
                    self.clear_settled_state(row);
                }
            }
        } else {
            self.changes.entry(row).or_default().values.insert(col, value);
        }

        self.events.emit(GridEvent::CellChanged { row, col });
    }

    /// Parse `input` for the column's type, then write it.
    pub fn set_text(&mut self, row: usize, col: usize, input: &str) -> Result<(), GridError> {
        let Some(column) = self.columns.get(col) else {
            log::warn!("[EDIT] set_text on missing column {}", col);
            return Ok(());
        };

        let value = self.parse_for_row(row, column, input)?;
        self.set_value(row, col, value);
        Ok(())
    }

    /// Parse input for a cell of `row`. `DEFAULT` is accepted only by new rows.
    pub(crate) fn parse_for_row(
        &self,
        row: usize,
        column: &ColumnSpec,
        input: &str,
    ) -> Result<Value, ValidationError> {
        let value = parse_cell_input(column, input)?;
        if value.is_default() && !self.is_new_row(row) {
            return Err(ValidationError::DefaultOnExistingRow {
                column: column.name.to_string(),
            });
        }
        Ok(value)
    }

    /// Append a client-side row seeded with `initial` (by column name).
    /// Returns its index.
    pub fn insert_row(&mut self, initial: &Record) -> usize {
        let row = self.rows.len();
        self.rows.push(vec![Value::Default; self.columns.len()]);

        let mut change = RowChange::new_row();
        for (name, value) in initial {
            match self.column_index(name) {
                Some(col) if !value.is_default() => {
                    change.values.insert(col, value.clone());
                }
                Some(_) => {}
                None => log::warn!("[EDIT] insert_row ignores unknown column '{}'", name),
            }
        }
        self.changes.insert(row, change);

        log::debug!("[EDIT] Inserted row {}", row);
        self.events.emit(GridEvent::RowInserted { row });
        row
    }

    /// Mark a row for deletion. A pending insert is dropped outright.
    pub fn mark_row_removed(&mut self, row: usize) -> Result<(), GridError> {
        if row >= self.rows.len() {
            log::warn!("[EDIT] mark_row_removed out of range: row {}", row);
            return Ok(());
        }

        if self.is_new_row(row) {
            if self.commit_in_flight {
                return Err(GridError::CommitInFlight);
            }
            self.remove_row_at(row);
            self.events.emit(GridEvent::RowDropped { row });
        } else {
            self.changes.entry(row).or_default().is_removed = true;
            self.events
                .emit(GridEvent::RowRemovalChanged { row, removed: true });
        }
        Ok(())
    }

    pub fn unmark_row_removed(&mut self, row: usize) {
        let Some(change) = self.changes.get_mut(&row) else {
            return;
        };
        if !change.is_removed {
            return;
        }

        change.is_removed = false;
        if change.is_empty() {
            self.changes.remove(&row);
            self.clear_settled_state(row);
        }

        self.events
            .emit(GridEvent::RowRemovalChanged { row, removed: false });
    }

    pub fn is_new_row(&self, row: usize) -> bool {
        self.changes.get(&row).is_some_and(|c| c.is_new_row)
    }

    pub fn is_row_removed(&self, row: usize) -> bool {
        self.changes.get(&row).is_some_and(|c| c.is_removed)
    }

    pub fn is_cell_changed(&self, row: usize, col: usize) -> bool {
        self.changes
            .get(&row)
            .is_some_and(|c| c.values.contains_key(&col))
    }

    pub fn row_change(&self, row: usize) -> Option<&RowChange> {
        self.changes.get(&row)
    }

    pub fn row_status(&self, row: usize) -> RowStatus {
        let change = self.changes.get(&row);
        let state = match self.row_states.get(&row) {
            Some(state) => state.clone(),
            None if change.is_some() => RowState::Dirty,
            None => RowState::Clean,
        };

        RowStatus {
            is_new: change.is_some_and(|c| c.is_new_row),
            is_removed: change.is_some_and(|c| c.is_removed),
            is_dirty: change.is_some_and(|c| !c.values.is_empty()),
            state,
        }
    }

    /// Rows with pending changes, ascending by row index.
    pub fn changed_rows(&self) -> Vec<(usize, &RowChange)> {
        self.changes
            .iter()
            .filter(|(_, change)| !change.is_empty())
            .map(|(&row, change)| (row, change))
            .collect()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.changes.values().any(|c| !c.is_empty())
    }

    /// Merge canonical values into base rows and clear their overlay.
    /// Rows whose change was a removal are dropped from the grid.
    pub fn apply_changes(&mut self, applied: &[AppliedChange]) {
        self.apply_changes_keeping(applied, BTreeMap::new());
    }

    pub(crate) fn apply_changes_keeping(
        &mut self,
        applied: &[AppliedChange],
        leftovers: BTreeMap<usize, RowChange>,
    ) {
        let mut deleted = Vec::new();

        for change in applied {
            let row = change.row_index;
            if row >= self.rows.len() {
                log::warn!("[COMMIT] apply_changes out of range: row {}", row);
                continue;
            }

            let pending = self.changes.remove(&row);
            self.row_states.remove(&row);

            if pending.is_some_and(|c| c.is_removed && !c.is_new_row) {
                deleted.push(row);
            } else {
                self.merge_record(row, &change.values);
            }
        }

        for (row, leftover) in leftovers {
            if deleted.contains(&row) || row >= self.rows.len() {
                continue;
            }

            let mut change = RowChange {
                is_removed: leftover.is_removed,
                ..RowChange::default()
            };
            for (col, value) in leftover.values {
                if self.rows[row].get(col) != Some(&value) {
                    change.values.insert(col, value);
                }
            }
            if !change.is_empty() {
                self.changes.insert(row, change);
            }
        }

        deleted.sort_unstable();
        for row in deleted.into_iter().rev() {
            self.remove_row_at(row);
        }
    }

    /// Revert one row, or every row when `row` is `None`. Pending inserts are
    /// dropped.
    pub fn discard_changes(&mut self, row: Option<usize>) -> Result<(), GridError> {
        match row {
            Some(row) => {
                if self.is_new_row(row) {
                    if self.commit_in_flight {
                        return Err(GridError::CommitInFlight);
                    }
                    self.remove_row_at(row);
                } else {
                    self.changes.remove(&row);
                    self.row_states.remove(&row);
                }
            }
            None => {
                let new_rows: Vec<usize> = self
                    .changes
                    .iter()
                    .filter(|(_, c)| c.is_new_row)
                    .map(|(&r, _)| r)
                    .collect();

                if self.commit_in_flight && !new_rows.is_empty() {
                    return Err(GridError::CommitInFlight);
                }
                for row in new_rows.into_iter().rev() {
                    self.remove_row_at(row);
                }
                self.changes.clear();
                self.row_states.clear();
            }
        }

        log::debug!("[EDIT] Discarded changes for {:?}", row);
        self.events.emit(GridEvent::ChangesDiscarded { row });
        Ok(())
    }

    // --- Loading ---

    /// Replace all data with a new result. The state gets a fresh identity so
    /// an outstanding commit for the old data is discarded.
    pub fn reload(&mut self, result: &QueryResult) {
        self.columns = result.columns.iter().map(ColumnSpec::from).collect();
        if let Some(schema) = &self.schema {
            for column in &mut self.columns {
                column.annotate(schema);
            }
        }
        self.layout.reset_columns(&self.columns);

        self.rows = result
            .rows
            .iter()
            .map(|row| self.normalize_row(row.clone()))
            .collect();
        self.changes.clear();
        self.row_states.clear();
        self.stats = result.stats.clone();
        self.commit_in_flight = false;
        self.id = Uuid::new_v4();

        let had_selection = !self.selection.is_empty();
        self.selection.clear();

        log::debug!("[LOAD] Reloaded {} rows", self.rows.len());
        self.events.emit(GridEvent::DataReloaded {
            row_count: self.rows.len(),
        });
        if had_selection {
            self.emit_selection();
        }
    }

    /// Add a page of base rows. They go before any pending inserts.
    pub fn append_rows(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<(), GridError> {
        if self.commit_in_flight {
            return Err(GridError::CommitInFlight);
        }

        let at = self.first_pending_insert();
        let page: Vec<Row> = rows.into_iter().map(|r| self.normalize_row(r)).collect();
        let count = page.len();
        if count == 0 {
            return Ok(());
        }

        self.rows.splice(at..at, page);
        self.changes = shift_after_insert(std::mem::take(&mut self.changes), at, count);
        self.row_states = shift_after_insert(std::mem::take(&mut self.row_states), at, count);
        self.selection.rows_inserted(at, count);

        log::debug!("[LOAD] Appended {} rows at {}", count, at);
        self.events.emit(GridEvent::RowsAppended { count });
        Ok(())
    }

    /// Merge re-fetched rows into base data without touching edits that still
    /// differ. `None` means the row no longer exists and is dropped.
    pub fn reconcile_rows(&mut self, fetched: &[(usize, Option<Record>)]) -> Result<(), GridError> {
        if self.commit_in_flight {
            return Err(GridError::CommitInFlight);
        }

        let mut gone = Vec::new();
        for (row, record) in fetched {
            let row = *row;
            if row >= self.rows.len() {
                log::warn!("[LOAD] reconcile_rows out of range: row {}", row);
                continue;
            }

            let Some(record) = record else {
                gone.push(row);
                continue;
            };

            self.merge_record(row, record);

            if let Some(change) = self.changes.get_mut(&row) {
                let base = &self.rows[row];
                change.values.retain(|&col, value| base.get(col) != Some(value));
                if change.is_empty() {
                    self.changes.remove(&row);
                    self.row_states.remove(&row);
                }
            }
        }

        gone.sort_unstable();
        gone.dedup();
        for row in gone.into_iter().rev() {
            self.remove_row_at(row);
            self.events.emit(GridEvent::RowDropped { row });
        }
        Ok(())
    }

    // --- Viewport ---

    pub fn visible_range(&self, scroll_top: f32, viewport_height: f32) -> VisibleRange {
        compute_visible_range(
            scroll_top,
            viewport_height,
            self.config.row_height,
            self.rows.len(),
            self.config.render_ahead,
        )
    }

    pub fn padding(&self, range: VisibleRange) -> Padding {
        compute_padding(
            range.start,
            range.end,
            self.rows.len(),
            self.config.row_height,
        )
    }

    pub fn content_height(&self) -> f32 {
        self.rows.len() as f32 * self.config.row_height
    }

    // --- Column Layout ---

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut ColumnLayout {
        &mut self.layout
    }

    pub fn resize_column(&mut self, col: usize, delta: f32) -> f32 {
        self.layout.resize_column(col, delta)
    }

    // --- Sort ---

    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn set_sort(&mut self, sort: Option<SortState>) {
        if self.sort != sort {
            self.sort = sort;
            self.events.emit(GridEvent::SortChanged(sort));
        }
    }

    /// Cycle sort state for a column: none -> asc -> desc -> none
    pub fn cycle_sort(&mut self, col_ix: usize) {
        if col_ix >= self.columns.len() {
            return;
        }
        self.set_sort(next_sort_state(self.sort, col_ix));
    }

    // --- Selection ---

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn focus(&self) -> Option<CellCoord> {
        self.selection.focus()
    }

    pub fn click(&mut self, row: usize, col: usize) {
        if !self.in_bounds(row, col) {
            return;
        }
        self.update_selection(|sel| sel.click(row, col));
    }

    pub fn ctrl_click(&mut self, row: usize) {
        if row >= self.rows.len() {
            return;
        }
        self.update_selection(|sel| sel.ctrl_click(row));
    }

    pub fn shift_click(&mut self, row: usize) {
        if row >= self.rows.len() {
            return;
        }
        self.update_selection(|sel| sel.shift_click(row));
    }

    /// Secondary click. Emits `ContextMenuRequested` with the target rows.
    pub fn right_click(&mut self, row: usize, col: usize) -> Vec<usize> {
        if !self.in_bounds(row, col) {
            return Vec::new();
        }

        let mut rows = Vec::new();
        self.update_selection(|sel| rows = sel.right_click(row, col));
        self.events.emit(GridEvent::ContextMenuRequested {
            row,
            col,
            rows: rows.clone(),
        });
        rows
    }

    /// Move focus in a direction. If extend is true, grow the selection instead of moving.
    pub fn move_focus(&mut self, direction: Direction, extend: bool) {
        let (rows, cols) = (self.rows.len(), self.columns.len());
        self.update_selection(|sel| sel.move_focus(direction, extend, rows, cols));
    }

    pub fn move_to_edge(&mut self, edge: Edge, extend: bool) {
        let (rows, cols) = (self.rows.len(), self.columns.len());
        self.update_selection(|sel| sel.move_to_edge(edge, extend, rows, cols));
    }

    pub fn select_all(&mut self) {
        let (rows, cols) = (self.rows.len(), self.columns.len());
        self.update_selection(|sel| sel.select_all(rows, cols));
    }

    pub fn clear_selection(&mut self) {
        self.update_selection(SelectionState::clear);
    }

    pub fn begin_drag(&mut self, row: usize, col: usize) {
        if !self.in_bounds(row, col) {
            return;
        }
        self.update_selection(|sel| sel.begin_drag(row, col));
    }

    pub fn drag_over(&mut self, row: usize) {
        let row = row.min(self.rows.len().saturating_sub(1));
        if self.rows.is_empty() {
            return;
        }
        self.update_selection(|sel| sel.drag_over(row));
    }

    pub fn end_drag(&mut self) {
        self.selection.end_drag();
    }

    // --- Internals ---

    fn update_selection(&mut self, f: impl FnOnce(&mut SelectionState)) {
        let before = self.selection.clone();
        f(&mut self.selection);
        if self.selection != before {
            self.emit_selection();
        }
    }

    fn emit_selection(&self) {
        self.events.emit(GridEvent::SelectionChanged {
            focus: self.selection.focus(),
            rows: self.selection.selected_rows().collect(),
        });
    }

    fn in_bounds(&self, row: usize, col: usize) -> bool {
        let ok = row < self.rows.len() && col < self.columns.len();
        if !ok {
            log::warn!("[EDIT] Cell ({}, {}) is out of range", row, col);
        }
        ok
    }

    /// Pad or cut a row to the column count.
    fn normalize_row(&self, mut row: Row) -> Row {
        if row.len() != self.columns.len() {
            log::warn!(
                "[LOAD] Row has {} values for {} columns",
                row.len(),
                self.columns.len()
            );
            row.resize(self.columns.len(), Value::Null);
        }
        row
    }

    pub(crate) fn merge_record(&mut self, row: usize, record: &Record) {
        for (name, value) in record {
            match self.column_index(name) {
                Some(col) => self.rows[row][col] = value.clone(),
                None => log::debug!("[COMMIT] Ignoring returned column '{}'", name),
            }
        }
    }

    /// Error markers stay until the next commit or discard.
    fn clear_settled_state(&mut self, row: usize) {
        if self.row_states.get(&row).is_some_and(|s| !s.is_error()) {
            self.row_states.remove(&row);
        }
    }

    /// Start of the trailing block of pending inserts.
    fn first_pending_insert(&self) -> usize {
        let mut at = self.rows.len();
        while at > 0 && self.is_new_row(at - 1) {
            at -= 1;
        }
        at
    }

    pub(crate) fn remove_row_at(&mut self, row: usize) {
        self.rows.remove(row);
        self.changes = shift_after_removal(std::mem::take(&mut self.changes), row);
        self.row_states = shift_after_removal(std::mem::take(&mut self.row_states), row);
        self.selection.row_removed(row, self.rows.len());
    }
}

fn shift_after_removal<T>(map: BTreeMap<usize, T>, removed: usize) -> BTreeMap<usize, T> {
    map.into_iter()
        .filter(|(row, _)| *row != removed)
        .map(|(row, v)| if row > removed { (row - 1, v) } else { (row, v) })
        .collect()
}

fn shift_after_insert<T>(map: BTreeMap<usize, T>, at: usize, count: usize) -> BTreeMap<usize, T> {
    map.into_iter()
        .map(|(row, v)| if row >= at { (row + count, v) } else { (row, v) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use studio_core::ColumnMeta;

    fn users(count: i64) -> TableState {
        let rows = (1..=count)
            .map(|id| vec![Value::Int(id), Value::Text(format!("user{}", id))])
            .collect();
        let result = QueryResult::new(
            vec![
                ColumnMeta::new("id", "INTEGER", false),
                ColumnMeta::new("name", "TEXT", true),
            ],
            rows,
        );
        TableState::new(&result, GridConfig::default())
    }

    fn name(value: &str) -> Record {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::Text(value.to_string()));
        record
    }

    #[test]
    fn overlay_shadows_base_until_discarded() {
        let mut state = users(3);
        state.set_value(1, 1, Value::Text("Alice".into()));

        assert_eq!(state.value(1, 1), Some(&Value::Text("Alice".into())));
        assert_eq!(state.base_value(1, 1), Some(&Value::Text("user2".into())));
        assert!(state.is_cell_changed(1, 1));

        state.discard_changes(Some(1)).expect("discard");
        assert_eq!(state.value(1, 1), Some(&Value::Text("user2".into())));
        assert!(state.changed_rows().is_empty());
    }

    #[test]
    fn writing_base_value_back_is_not_dirty() {
        let mut state = users(2);
        state.set_value(0, 1, Value::Text("x".into()));
        state.set_value(0, 1, Value::Text("user1".into()));

        assert!(state.changed_rows().is_empty());
        assert_eq!(state.row_status(0).state, RowState::Clean);
    }

    #[test]
    fn out_of_range_access_is_a_no_op() {
        let mut state = users(2);
        assert_eq!(state.value(9, 0), None);
        state.set_value(9, 0, Value::Int(1));
        state.click(0, 7);

        assert!(!state.has_pending_changes());
        assert!(state.selection().is_empty());
    }

    #[test]
    fn inserted_rows_are_new_and_removed_outright() {
        let mut state = users(2);
        let first = state.insert_row(&name("Bob"));
        let second = state.insert_row(&name("Carol"));
        assert_eq!((first, second), (2, 3));
        assert_eq!(state.value(2, 0), Some(&Value::Default));
        assert!(state.row_status(2).is_new);

        state.mark_row_removed(first).expect("remove");
        assert_eq!(state.row_count(), 3);
        assert_eq!(state.value(2, 1), Some(&Value::Text("Carol".into())));
        assert!(state.is_new_row(2));
    }

    #[test]
    fn dropping_a_pending_insert_reports_the_drop() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event.clone());
            }
        });

        let mut state = users(2).with_event_bus(bus);
        let row = state.insert_row(&name("Bob"));
        state.mark_row_removed(row).expect("remove");
        state.mark_row_removed(0).expect("remove");

        let events = seen.lock().map(|e| e.clone()).unwrap_or_default();
        assert_eq!(
            events,
            vec![
                GridEvent::RowInserted { row: 2 },
                GridEvent::RowDropped { row: 2 },
                GridEvent::RowRemovalChanged {
                    row: 0,
                    removed: true
                },
            ]
        );
    }

    #[test]
    fn removed_rows_keep_their_values() {
        let mut state = users(3);
        state.mark_row_removed(1).expect("remove");

        let status = state.row_status(1);
        assert!(status.is_removed);
        assert!(!status.is_dirty);
        assert_eq!(state.value(1, 1), Some(&Value::Text("user2".into())));

        state.unmark_row_removed(1);
        assert!(state.changed_rows().is_empty());
    }

    #[test]
    fn set_text_validates_before_writing() {
        let mut state = users(1);
        state.set_text(0, 0, "12").expect("valid integer");
        assert_eq!(state.value(0, 0), Some(&Value::Int(12)));

        let error = state.set_text(0, 0, "twelve").expect_err("invalid");
        assert!(matches!(error, GridError::Validation(_)));
        assert_eq!(state.value(0, 0), Some(&Value::Int(12)));
    }

    #[test]
    fn default_marker_is_refused_for_loaded_rows() {
        let mut state = users(1);
        let error = state.set_text(0, 1, "default").expect_err("loaded row");
        assert!(matches!(
            error,
            GridError::Validation(ValidationError::DefaultOnExistingRow { .. })
        ));
        assert!(!state.has_pending_changes());

        let row = state.insert_row(&name("Bob"));
        state.set_text(row, 1, "DEFAULT").expect("new row");
        assert_eq!(state.value(row, 1), Some(&Value::Default));
    }

    #[test]
    fn apply_changes_promotes_overlay_and_drops_deleted_rows() {
        let mut state = users(4);
        state.set_value(0, 1, Value::Text("Ann".into()));
        state.mark_row_removed(2).expect("remove");
        state.click(3, 0);

        state.apply_changes(&[
            AppliedChange {
                row_index: 0,
                values: name("Ann"),
            },
            AppliedChange {
                row_index: 2,
                values: Record::new(),
            },
        ]);

        assert!(state.changed_rows().is_empty());
        assert_eq!(state.row_count(), 3);
        assert_eq!(state.base_value(0, 1), Some(&Value::Text("Ann".into())));
        assert_eq!(state.value(2, 0), Some(&Value::Int(4)));
        assert_eq!(state.focus(), Some(CellCoord::new(2, 0)));
    }

    #[test]
    fn append_goes_before_pending_inserts() {
        let mut state = users(2);
        let inserted = state.insert_row(&name("Bob"));
        state.click(inserted, 1);

        state
            .append_rows(vec![vec![Value::Int(3), Value::Text("user3".into())]])
            .expect("append");

        assert_eq!(state.row_count(), 4);
        assert_eq!(state.value(2, 0), Some(&Value::Int(3)));
        assert!(state.is_new_row(3));
        assert_eq!(state.focus(), Some(CellCoord::new(3, 1)));
    }

    #[test]
    fn reconcile_merges_fetched_rows() {
        let mut state = users(3);
        state.set_value(0, 1, Value::Text("Ann".into()));
        state.set_value(1, 1, Value::Text("Ben".into()));

        state
            .reconcile_rows(&[(0, Some(name("Ann"))), (2, None)])
            .expect("reconcile");

        assert_eq!(state.row_count(), 2);
        assert_eq!(state.base_value(0, 1), Some(&Value::Text("Ann".into())));
        let rows: Vec<usize> = state.changed_rows().iter().map(|(r, _)| *r).collect();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn reload_resets_everything_but_widths() {
        let mut state = users(3);
        let id = state.id();
        state.set_value(0, 1, Value::Null);
        state.click(1, 1);
        state.resize_column(1, 50.0);

        let result = QueryResult::new(
            vec![
                ColumnMeta::new("id", "INTEGER", false),
                ColumnMeta::new("name", "TEXT", true),
            ],
            vec![vec![Value::Int(9), Value::Text("nine".into())]],
        );
        state.reload(&result);

        assert_ne!(state.id(), id);
        assert_eq!(state.row_count(), 1);
        assert!(!state.has_pending_changes());
        assert!(state.selection().is_empty());
        assert_eq!(state.layout().width(1), 200.0);
    }

    #[test]
    fn events_are_delivered_to_the_injected_bus() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event.clone());
            }
        });

        let mut state = users(3).with_event_bus(bus);
        state.click(0, 0);
        state.ctrl_click(2);
        state.right_click(2, 1);
        state.cycle_sort(1);

        let events = seen.lock().map(|e| e.clone()).unwrap_or_default();
        assert_eq!(
            events.last(),
            Some(&GridEvent::SortChanged(Some(SortState::ascending(1))))
        );
        assert!(events.contains(&GridEvent::ContextMenuRequested {
            row: 2,
            col: 1,
            rows: vec![0, 2],
        }));
    }
}
