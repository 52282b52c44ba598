use std::collections::BTreeMap;

use studio_core::{
    Connection, DbError, OperationKind, OperationResult, Record, RowState, SqlDialect,
    SqlQueryBuilder, TableOperation, TableSchema,
};
use uuid::Uuid;

use crate::CommitError;
use crate::events::GridEvent;
use crate::model::RowChange;
use crate::state::{AppliedChange, TableState};

/// One operation of a commit and the row it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperation {
    pub row_index: usize,
    pub operation: TableOperation,
}

/// Operations for every changed row, in ascending row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    entries: Vec<PlannedOperation>,
}

impl CommitPlan {
    pub fn entries(&self) -> &[PlannedOperation] {
        &self.entries
    }

    pub fn operations(&self) -> Vec<TableOperation> {
        self.entries.iter().map(|e| e.operation.clone()).collect()
    }

    pub fn rows(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.row_index).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.entries
            .iter()
            .filter(|e| e.operation.kind() == kind)
            .count()
    }

    /// Render the statements the plan would run, for review before commit.
    pub fn to_sql(&self, dialect: &dyn SqlDialect, schema: Option<&str>, table: &str) -> Vec<String> {
        let builder = SqlQueryBuilder::new(dialect);

        self.entries
            .iter()
            .filter_map(|entry| {
                let sql = builder.build_operation(schema, table, &entry.operation);
                if sql.is_none() {
                    log::warn!(
                        "[COMMIT] Cannot render {} for row {}",
                        entry.operation.kind().label(),
                        entry.row_index
                    );
                }
                sql
            })
            .collect()
    }
}

/// Translate the overlay into INSERT/UPDATE/DELETE operations.
///
/// Keys always come from base values, so editing a key column updates the row
/// it was loaded as.
pub fn build_plan(table_schema: &TableSchema, state: &TableState) -> Result<CommitPlan, CommitError> {
    let auto_pk = table_schema.auto_increment_pk_column();
    let mut entries = Vec::new();

    for (row_index, change) in state.changed_rows() {
        let operation = if change.is_new_row {
            TableOperation::insert(
                insert_values(state, change, auto_pk),
                auto_pk.map(String::from),
            )
        } else if change.is_removed {
            TableOperation::delete(base_key(table_schema, state, row_index)?)
        } else {
            TableOperation::update(
                base_key(table_schema, state, row_index)?,
                changed_values(state, row_index, change)?,
            )
        };

        entries.push(PlannedOperation {
            row_index,
            operation,
        });
    }

    Ok(CommitPlan { entries })
}

fn insert_values(state: &TableState, change: &RowChange, auto_pk: Option<&str>) -> Record {
    change
        .values
        .iter()
        .filter(|(_, value)| !value.is_default())
        .filter_map(|(&col, value)| {
            let name = state.columns().get(col)?.name.to_string();
            if auto_pk == Some(name.as_str()) && value.is_absent() {
                return None;
            }
            Some((name, value.clone()))
        })
        .collect()
}

fn changed_values(state: &TableState, row: usize, change: &RowChange) -> Result<Record, CommitError> {
    let mut values = Record::new();

    for (&col, value) in &change.values {
        let Some(column) = state.columns().get(col) else {
            continue;
        };
        if value.is_default() {
            return Err(CommitError::DefaultInUpdate {
                row,
                column: column.name.to_string(),
            });
        }
        values.insert(column.name.to_string(), value.clone());
    }

    Ok(values)
}

fn base_key(
    table_schema: &TableSchema,
    state: &TableState,
    row: usize,
) -> Result<Record, CommitError> {
    let missing = || CommitError::MissingPrimaryKey {
        table: table_schema.table_name.clone(),
    };

    if table_schema.primary_key.is_empty() {
        return Err(missing());
    }

    table_schema
        .primary_key
        .iter()
        .map(|name| {
            let col = state.column_index(name).ok_or_else(missing)?;
            let value = state.base_value(row, col).ok_or_else(missing)?;
            if value.is_absent() {
                return Err(CommitError::UnresolvedKey {
                    table: table_schema.table_name.clone(),
                    row,
                });
            }
            Ok((name.clone(), value.clone()))
        })
        .collect()
}

/// Whether a committed row carries every primary key value.
fn has_key(table_schema: &TableSchema, record: &Record) -> bool {
    table_schema
        .primary_key
        .iter()
        .all(|name| record.get(name).is_some_and(|v| !v.is_absent()))
}

/// A commit that has been started but whose result is not applied yet.
///
/// Holds everything needed to talk to the driver, so the state can keep
/// taking edits while [`CommitTicket::send`] is awaited. A ticket is
/// finished at most once.
#[derive(Debug)]
pub struct CommitTicket {
    state_id: Uuid,
    sequence: u64,
    table_schema: TableSchema,
    plan: CommitPlan,
    snapshot: BTreeMap<usize, RowChange>,
}

impl CommitTicket {
    pub fn state_id(&self) -> Uuid {
        self.state_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn plan(&self) -> &CommitPlan {
        &self.plan
    }

    /// Send the plan to the driver. The only await point of a commit.
    pub async fn send<C>(&self, connection: &C) -> Result<Vec<OperationResult>, DbError>
    where
        C: Connection + ?Sized,
    {
        log::debug!(
            "[COMMIT] Sending {} operations for '{}' via {}",
            self.plan.len(),
            self.table_schema.table_name,
            connection.kind().display_name()
        );

        connection
            .update_table_data(
                self.table_schema.schema_name.as_deref(),
                &self.table_schema.table_name,
                &self.plan.operations(),
                &self.table_schema,
            )
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,

    /// Row indices the plan covered, as they were when the commit started.
    pub rows: Vec<usize>,

    /// Inserted rows (current indices) the driver returned without a primary
    /// key. They are flagged with an error and cannot be updated or deleted
    /// until the table is reloaded.
    pub unresolved: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CommitSummary),

    /// The state was reloaded while the commit was in flight; nothing applied.
    Discarded,
}

impl TableState {
    /// Build the plan, mark its rows as saving and set the in-flight flag.
    pub fn begin_commit(&mut self, table_schema: &TableSchema) -> Result<CommitTicket, CommitError> {
        if self.commit_in_flight {
            return Err(CommitError::InFlight);
        }

        let plan = build_plan(table_schema, self)?;
        if plan.is_empty() {
            return Err(CommitError::NoChanges);
        }

        let snapshot: BTreeMap<usize, RowChange> = plan
            .entries()
            .iter()
            .filter_map(|e| {
                self.changes
                    .get(&e.row_index)
                    .map(|c| (e.row_index, c.clone()))
            })
            .collect();

        let rows = plan.rows();
        for &row in &rows {
            self.row_states.insert(row, RowState::Saving);
        }
        self.commit_in_flight = true;
        self.commit_sequence += 1;

        log::info!(
            "[COMMIT] Starting commit of {} rows on '{}'",
            rows.len(),
            table_schema.table_name
        );
        self.events.emit(GridEvent::CommitStarted { rows });

        Ok(CommitTicket {
            state_id: self.id,
            sequence: self.commit_sequence,
            table_schema: table_schema.clone(),
            plan,
            snapshot,
        })
    }

    /// Apply the driver's answer to a ticket from [`TableState::begin_commit`].
    ///
    /// On failure nothing is applied: the overlay stays as it is and the rows
    /// carry the error message.
    pub fn finish_commit(
        &mut self,
        ticket: CommitTicket,
        result: Result<Vec<OperationResult>, DbError>,
    ) -> Result<CommitOutcome, CommitError> {
        if ticket.state_id != self.id {
            log::debug!("[COMMIT] Discarding result for replaced table state");
            return Ok(CommitOutcome::Discarded);
        }

        if !self.commit_in_flight || ticket.sequence != self.commit_sequence {
            log::warn!(
                "[COMMIT] Ignoring ticket #{} (current #{}, in flight: {})",
                ticket.sequence,
                self.commit_sequence,
                self.commit_in_flight
            );
            return Err(CommitError::StaleTicket);
        }

        self.commit_in_flight = false;
        let rows = ticket.plan.rows();

        let results = match result {
            Ok(results) => results,
            Err(source) => {
                log::error!("[COMMIT] Commit failed: {}", source);
                self.mark_failed(&rows, source.to_string());
                return Err(CommitError::Driver { rows, source });
            }
        };

        if results.len() != ticket.plan.len() {
            let error = CommitError::ResultMismatch {
                expected: ticket.plan.len(),
                actual: results.len(),
                rows: rows.clone(),
            };
            log::error!("[COMMIT] {}", error);
            self.mark_failed(&rows, error.to_string());
            return Err(error);
        }

        let leftovers = self.edits_since(&ticket.snapshot);
        let mut applied = Vec::with_capacity(results.len());
        let mut deleted = Vec::new();
        let mut keyless = Vec::new();

        for (entry, result) in ticket.plan.entries().iter().zip(results) {
            let row = entry.row_index;
            let values = match (&entry.operation, result.record) {
                (TableOperation::Delete { .. }, _) => {
                    // Already gone on the server; drop it even if unmarked meanwhile.
                    self.changes.entry(row).or_default().is_removed = true;
                    deleted.push(row);
                    Record::new()
                }
                (operation, record) => {
                    // A removal requested mid-flight stays pending in the leftovers.
                    if let Some(change) = self.changes.get_mut(&row) {
                        change.is_removed = false;
                    }

                    let record = record.unwrap_or_else(|| {
                        log::warn!(
                            "[COMMIT] Driver returned no row for row {}, keeping submitted values",
                            row
                        );
                        operation.values().cloned().unwrap_or_default()
                    });
                    if operation.kind() == OperationKind::Insert
                        && !has_key(&ticket.table_schema, &record)
                    {
                        keyless.push(row);
                    }
                    record
                }
            };

            applied.push(AppliedChange {
                row_index: row,
                values,
            });
        }

        self.apply_changes_keeping(&applied, leftovers);

        let unresolved: Vec<usize> = keyless
            .into_iter()
            .map(|row| row - deleted.iter().filter(|&&d| d < row).count())
            .collect();
        for &row in &unresolved {
            log::warn!(
                "[COMMIT] Row {} was inserted but its primary key is unknown",
                row
            );
            self.row_states.insert(
                row,
                RowState::Error("Primary key not returned; reload to edit this row".to_string()),
            );
        }

        let summary = CommitSummary {
            inserted: ticket.plan.count(OperationKind::Insert),
            updated: ticket.plan.count(OperationKind::Update),
            deleted: ticket.plan.count(OperationKind::Delete),
            rows: rows.clone(),
            unresolved,
        };

        log::info!(
            "[COMMIT] Committed {} inserts, {} updates, {} deletes",
            summary.inserted,
            summary.updated,
            summary.deleted
        );
        self.events.emit(GridEvent::CommitFinished { rows });
        Ok(CommitOutcome::Committed(summary))
    }

    /// Build, send and apply in one call.
    pub async fn commit<C>(
        &mut self,
        connection: &C,
        table_schema: &TableSchema,
    ) -> Result<CommitOutcome, CommitError>
    where
        C: Connection + ?Sized,
    {
        let ticket = self.begin_commit(table_schema)?;
        let result = ticket.send(connection).await;
        self.finish_commit(ticket, result)
    }

    /// Plan for the current overlay without starting a commit.
    pub fn plan(&self, table_schema: &TableSchema) -> Result<CommitPlan, CommitError> {
        build_plan(table_schema, self)
    }

    fn mark_failed(&mut self, rows: &[usize], message: String) {
        for &row in rows {
            if self.changes.contains_key(&row) {
                self.row_states
                    .insert(row, RowState::Error(message.clone()));
            } else {
                self.row_states.remove(&row);
            }
        }

        self.events.emit(GridEvent::CommitFailed {
            rows: rows.to_vec(),
            message,
        });
    }

    /// Edits made to snapshotted rows while their commit was in flight.
    fn edits_since(&self, snapshot: &BTreeMap<usize, RowChange>) -> BTreeMap<usize, RowChange> {
        snapshot
            .iter()
            .filter_map(|(&row, before)| {
                let now = self.changes.get(&row)?;

                let values: BTreeMap<_, _> = now
                    .values
                    .iter()
                    .filter(|(col, value)| before.values.get(col) != Some(*value))
                    .map(|(&col, value)| (col, value.clone()))
                    .collect();

                let leftover = RowChange {
                    values,
                    is_new_row: false,
                    is_removed: now.is_removed && !before.is_removed,
                };
                (!leftover.is_empty()).then_some((row, leftover))
            })
            .collect()
    }
}
