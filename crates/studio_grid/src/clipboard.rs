use studio_core::Value;

use crate::GridError;
use crate::model::format_hex;
use crate::state::TableState;

fn cell_text(value: &Value) -> String {
    match value {
        Value::Bytes(bytes) => format_hex(bytes),
        other => other
            .as_display_string_truncated(usize::MAX)
            .replace(['\t', '\n', '\r'], " "),
    }
}

/// Split tab-separated text into rows of cells. A trailing newline does not
/// produce an empty row.
pub fn parse_tsv(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_suffix('\r').unwrap_or(text);
    if text.is_empty() {
        return Vec::new();
    }

    text.split('\n')
        .map(|line| {
            line.strip_suffix('\r')
                .unwrap_or(line)
                .split('\t')
                .map(str::to_string)
                .collect()
        })
        .collect()
}

impl TableState {
    /// Selected rows as TSV, columns in display order. `None` when nothing is
    /// selected.
    pub fn copy_selection(&self) -> Option<String> {
        let rows: Vec<usize> = self.selection.selected_rows().collect();
        if rows.is_empty() || self.columns.is_empty() {
            return None;
        }

        let order = self.layout.display_order();
        let lines: Vec<String> = rows
            .into_iter()
            .map(|row| {
                order
                    .iter()
                    .map(|&col| self.value(row, col).map(cell_text).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect();

        Some(lines.join("\n"))
    }

    /// Write a TSV block starting at the focused cell, following display
    /// order. Cells past the last row or column are dropped. Every cell is
    /// validated before anything is written. Returns the number of cells
    /// written.
    pub fn paste_at_focus(&mut self, text: &str) -> Result<usize, GridError> {
        let Some(focus) = self.selection.focus() else {
            return Ok(0);
        };
        let Some(start_pos) = self.layout.display_position(focus.col) else {
            return Ok(0);
        };

        let order = self.layout.display_order().to_vec();
        let mut writes = Vec::new();

        for (dy, line) in parse_tsv(text).into_iter().enumerate() {
            let row = focus.row + dy;
            if row >= self.rows.len() {
                break;
            }

            for (dx, input) in line.iter().enumerate() {
                let Some(&col) = order.get(start_pos + dx) else {
                    break;
                };
                let value = self.parse_for_row(row, &self.columns[col], input)?;
                writes.push((row, col, value));
            }
        }

        let count = writes.len();
        for (row, col, value) in writes {
            self.set_value(row, col, value);
        }

        log::debug!("[EDIT] Pasted {} cells at ({}, {})", count, focus.row, focus.col);
        Ok(count)
    }
}
